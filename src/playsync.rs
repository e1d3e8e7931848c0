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
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// A cancel handle is shared between whoever starts a long-running operation (the polling
/// loop, a playing clip) and whoever may need to stop it. Waiters are woken as soon as the
/// handle is cancelled.
#[derive(Clone, Default)]
pub struct CancelHandle {
    /// Set once the operation has been cancelled. Never reset.
    cancelled: Arc<Mutex<bool>>,
    /// Wakes anyone sleeping on the handle.
    condvar: Arc<Condvar>,
}

impl CancelHandle {
    /// Creates a new cancel handle.
    pub fn new() -> CancelHandle {
        CancelHandle::default()
    }

    /// Returns true if the handle has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock()
    }

    /// Cancels the handle and wakes all waiters. Cancelling twice is a no-op.
    pub fn cancel(&self) {
        let mut cancelled = self.cancelled.lock();
        if !*cancelled {
            *cancelled = true;
            self.condvar.notify_all();
        }
    }

    /// Wakes waiters so they can re-check their finished flag.
    pub fn notify(&self) {
        // Taken so a waiter can't miss the wakeup between its check and its wait.
        let _cancelled = self.cancelled.lock();
        self.condvar.notify_all();
    }

    /// Blocks until the handle is cancelled or `finished` becomes true.
    pub fn wait(&self, finished: Arc<AtomicBool>) {
        let mut cancelled = self.cancelled.lock();
        self.condvar.wait_while(&mut cancelled, |cancelled| {
            !*cancelled && !finished.load(Ordering::Relaxed)
        });
    }

    /// Sleeps for up to `timeout`, returning early if the handle is cancelled.
    /// Returns true if the handle was cancelled.
    pub fn sleep(&self, timeout: Duration) -> bool {
        let mut cancelled = self.cancelled.lock();
        self.condvar
            .wait_while_for(&mut cancelled, |cancelled| !*cancelled, timeout);
        *cancelled
    }
}
