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

/// Errors from claiming or reading input pins.
#[derive(Debug, thiserror::Error)]
pub enum GpioError {
    /// The pin is claimed by someone else, does not exist, or the GPIO peripheral
    /// could not be opened at all.
    #[error("GPIO {pin} is unavailable: {reason}")]
    ResourceUnavailable { pin: u8, reason: String },

    /// A read failed. Callers treat this as transient.
    #[error("failed to read GPIO {pin}: {reason}")]
    Read { pin: u8, reason: String },
}
