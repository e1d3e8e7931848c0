// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Environment variable holding the poll thread priority (0-99).
const PRIORITY_ENV: &str = "SOUNDPAD_THREAD_PRIORITY";

/// Default priority for the poll thread when SOUNDPAD_THREAD_PRIORITY is unset.
const DEFAULT_POLL_THREAD_PRIORITY: u8 = 50;

/// Reads SOUNDPAD_THREAD_PRIORITY (0-99). Anything unparseable or out of range falls back
/// to the default.
pub fn poll_thread_priority() -> u8 {
    std::env::var(PRIORITY_ENV)
        .ok()
        .and_then(|v| v.trim().parse::<u8>().ok())
        .filter(|n| *n < 100)
        .unwrap_or(DEFAULT_POLL_THREAD_PRIORITY)
}

/// Raises the current thread's priority. Failure (usually missing privileges) is logged
/// and otherwise ignored.
pub fn configure_poll_thread_priority(priority: u8) {
    let value = match ThreadPriorityValue::try_from(priority) {
        Ok(value) => value,
        Err(e) => {
            warn!(priority, err = ?e, "Invalid thread priority");
            return;
        }
    };

    match set_current_thread_priority(ThreadPriority::Crossplatform(value)) {
        Ok(()) => info!(priority, "Set poll thread priority"),
        Err(e) => warn!(priority, err = ?e, "Failed to set poll thread priority"),
    }
}
