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

//! Digital input access.
//!
//! The sampler only needs to claim a pin as a pulled-up input, read its level and give it
//! back. Backends are chosen by name: anything starting with `mock` gets the in-process
//! mock, everything else goes to rppal.

use std::fmt;

pub mod error;
pub mod mock;
pub mod rppal;

pub use error::GpioError;

/// The logic level of an input pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Pins are pulled up, so a pressed button pulls the line low.
    pub fn is_pressed(self) -> bool {
        self == Level::Low
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => write!(f, "low"),
            Level::High => write!(f, "high"),
        }
    }
}

/// A source of digital input levels.
pub trait Device: fmt::Display + Send {
    /// Claims the pin as a digital input with the internal pull-up enabled.
    fn claim_input_pullup(&mut self, pin: u8) -> Result<(), GpioError>;

    /// Reads the current raw level of a claimed pin.
    fn read(&mut self, pin: u8) -> Result<Level, GpioError>;

    /// Gives the pin back to the system. Releasing an unclaimed pin does nothing.
    fn release(&mut self, pin: u8);
}

/// Gets the GPIO backend with the given name. Nothing is claimed until the sampler
/// initializes its channels.
pub fn get_device(name: &str) -> Box<dyn Device> {
    if name.starts_with("mock") {
        return Box::new(mock::Device::get(name));
    }

    Box::new(rppal::Device::new())
}
