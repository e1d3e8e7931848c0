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
use std::collections::HashMap;
use std::fmt;

use rppal::gpio::{Gpio, InputPin};
use tracing::{debug, info};

use super::{GpioError, Level};

/// Raspberry Pi GPIO through rppal, using BCM pin numbering.
///
/// The peripheral is opened on the first claim so that the error can name the pin that
/// needed it. Dropping an `InputPin` restores the pin's previous mode, which is how pins
/// are released.
pub struct Device {
    gpio: Option<Gpio>,
    pins: HashMap<u8, InputPin>,
}

impl Device {
    /// Creates a device that has not touched the hardware yet.
    pub fn new() -> Device {
        Device {
            gpio: None,
            pins: HashMap::new(),
        }
    }

    fn gpio(&mut self, pin: u8) -> Result<&Gpio, GpioError> {
        if self.gpio.is_none() {
            let gpio = Gpio::new().map_err(|e| GpioError::ResourceUnavailable {
                pin,
                reason: e.to_string(),
            })?;
            info!("Opened GPIO peripheral.");
            self.gpio = Some(gpio);
        }

        self.gpio.as_ref().ok_or(GpioError::ResourceUnavailable {
            pin,
            reason: "GPIO peripheral not open".to_string(),
        })
    }
}

impl Default for Device {
    fn default() -> Self {
        Device::new()
    }
}

impl super::Device for Device {
    fn claim_input_pullup(&mut self, pin: u8) -> Result<(), GpioError> {
        if self.pins.contains_key(&pin) {
            return Err(GpioError::ResourceUnavailable {
                pin,
                reason: "pin is already claimed".to_string(),
            });
        }

        let input = self
            .gpio(pin)?
            .get(pin)
            .map_err(|e| GpioError::ResourceUnavailable {
                pin,
                reason: e.to_string(),
            })?
            .into_input_pullup();

        debug!(pin, "Configured GPIO as input with pull-up.");
        self.pins.insert(pin, input);
        Ok(())
    }

    fn read(&mut self, pin: u8) -> Result<Level, GpioError> {
        match self.pins.get(&pin) {
            Some(input) => Ok(match input.read() {
                rppal::gpio::Level::Low => Level::Low,
                rppal::gpio::Level::High => Level::High,
            }),
            None => Err(GpioError::Read {
                pin,
                reason: "pin is not claimed".to_string(),
            }),
        }
    }

    fn release(&mut self, pin: u8) {
        if self.pins.remove(&pin).is_some() {
            debug!(pin, "Released GPIO.");
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rppal ({} pins claimed)", self.pins.len())
    }
}
