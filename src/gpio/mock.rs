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
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{GpioError, Level};

/// Highest BCM pin on the 40-pin header.
const MAX_PIN: u8 = 27;

#[derive(Default)]
struct State {
    /// Levels set by the test. Unset pins idle high like a pulled-up input.
    levels: HashMap<u8, Level>,
    claimed: HashSet<u8>,
    /// Pins that behave as if another process holds them.
    busy: HashSet<u8>,
    /// Pins whose reads fail.
    faulty: HashSet<u8>,
    releases: usize,
}

/// A mock GPIO bank. Clones share state, so a test can keep a handle and drive levels
/// while the sampler owns the boxed device.
#[derive(Clone)]
pub struct Device {
    name: String,
    state: Arc<Mutex<State>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Sets the raw level a pin will read.
    pub fn set_level(&self, pin: u8, level: Level) {
        self.state.lock().levels.insert(pin, level);
    }

    /// Pulls the pin low, as a pressed button does.
    pub fn press(&self, pin: u8) {
        self.set_level(pin, Level::Low);
    }

    /// Lets the pin float back high.
    pub fn release_button(&self, pin: u8) {
        self.set_level(pin, Level::High);
    }

    /// Marks the pin as held by another process.
    pub fn set_busy(&self, pin: u8) {
        self.state.lock().busy.insert(pin);
    }

    /// Makes reads of the pin fail (or succeed again).
    pub fn set_faulty(&self, pin: u8, faulty: bool) {
        let mut state = self.state.lock();
        if faulty {
            state.faulty.insert(pin);
        } else {
            state.faulty.remove(&pin);
        }
    }

    /// Returns true if the pin is currently claimed.
    pub fn is_claimed(&self, pin: u8) -> bool {
        self.state.lock().claimed.contains(&pin)
    }

    /// Returns the number of currently claimed pins.
    pub fn claimed_count(&self) -> usize {
        self.state.lock().claimed.len()
    }

    /// Returns how many pins have been released over the device's lifetime.
    pub fn release_count(&self) -> usize {
        self.state.lock().releases
    }
}

impl super::Device for Device {
    fn claim_input_pullup(&mut self, pin: u8) -> Result<(), GpioError> {
        let mut state = self.state.lock();
        if pin > MAX_PIN {
            return Err(GpioError::ResourceUnavailable {
                pin,
                reason: "no such pin".to_string(),
            });
        }
        if state.busy.contains(&pin) || state.claimed.contains(&pin) {
            return Err(GpioError::ResourceUnavailable {
                pin,
                reason: "pin is already claimed".to_string(),
            });
        }

        state.claimed.insert(pin);
        debug!(device = self.name, pin, "Claimed mock GPIO.");
        Ok(())
    }

    fn read(&mut self, pin: u8) -> Result<Level, GpioError> {
        let state = self.state.lock();
        if !state.claimed.contains(&pin) {
            return Err(GpioError::Read {
                pin,
                reason: "pin is not claimed".to_string(),
            });
        }
        if state.faulty.contains(&pin) {
            return Err(GpioError::Read {
                pin,
                reason: "simulated fault".to_string(),
            });
        }

        Ok(state.levels.get(&pin).copied().unwrap_or(Level::High))
    }

    fn release(&mut self, pin: u8) {
        let mut state = self.state.lock();
        if state.claimed.remove(&pin) {
            state.releases += 1;
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
