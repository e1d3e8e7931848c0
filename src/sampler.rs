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

//! Turns noisy button levels into press events.

use std::time::{Duration, Instant};

use tracing::{debug, info, span, warn, Level as TraceLevel};

use crate::gpio::{self, GpioError, Level};

pub mod debounce;

pub use debounce::{Debouncer, Edge};

/// One physical button.
pub struct Channel {
    /// Position in the configured pin list. Matches the dispatcher's channel index.
    index: usize,
    /// BCM pin number.
    pin: u8,
    debouncer: Debouncer,
    /// True while the button is confirmed released. A press is only reported while armed.
    armed: bool,
    /// Consecutive failed reads, for log throttling.
    failed_reads: u32,
}

impl Channel {
    fn new(index: usize, pin: u8, settle: Duration, poll_interval: Duration) -> Channel {
        Channel {
            index,
            pin,
            debouncer: Debouncer::new(settle, poll_interval),
            armed: true,
            failed_reads: 0,
        }
    }

    /// Returns the channel index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the pin number.
    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Returns the debounced level.
    pub fn confirmed(&self) -> Level {
        self.debouncer.confirmed()
    }

    /// Returns true if the next confirmed press will be reported.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Advances the debouncer with a fresh reading and reports whether a press fired.
    fn sample(&mut self, reading: Result<Level, GpioError>, now: Instant) -> bool {
        let raw = match reading {
            Ok(raw) => raw,
            Err(e) => {
                self.failed_reads += 1;
                if self.failed_reads == 1 {
                    warn!(
                        channel = self.index,
                        pin = self.pin,
                        err = %e,
                        "Read failed, keeping previous state."
                    );
                } else {
                    debug!(
                        channel = self.index,
                        pin = self.pin,
                        failed_reads = self.failed_reads,
                        "Read still failing."
                    );
                }
                return false;
            }
        };

        if self.failed_reads > 0 {
            info!(
                channel = self.index,
                pin = self.pin,
                failed_reads = self.failed_reads,
                "Reads recovered."
            );
            self.failed_reads = 0;
        }

        match self.debouncer.update(raw, now) {
            Some(Edge::Pressed) if self.armed => {
                self.armed = false;
                debug!(channel = self.index, pin = self.pin, "Button pressed.");
                true
            }
            Some(Edge::Released) => {
                self.armed = true;
                debug!(channel = self.index, pin = self.pin, "Button released.");
                false
            }
            _ => false,
        }
    }
}

/// Polls every configured pin and debounces each one.
pub struct InputSampler {
    device: Box<dyn gpio::Device>,
    channels: Vec<Channel>,
    /// False once the pins have been given back.
    claimed: bool,
}

impl InputSampler {
    /// Claims each pin as a pulled-up input, in order. If any claim fails the pins
    /// claimed so far are released and the error is returned.
    pub fn initialize(
        mut device: Box<dyn gpio::Device>,
        pins: &[u8],
        settle: Duration,
        poll_interval: Duration,
    ) -> Result<InputSampler, GpioError> {
        let span = span!(TraceLevel::INFO, "sampler");
        let _enter = span.enter();

        let mut channels: Vec<Channel> = Vec::with_capacity(pins.len());
        for (index, pin) in pins.iter().copied().enumerate() {
            if let Err(e) = device.claim_input_pullup(pin) {
                for channel in channels.iter() {
                    device.release(channel.pin);
                }
                return Err(e);
            }
            info!(channel = index, pin, "Configured GPIO as input with pull-up.");
            channels.push(Channel::new(index, pin, settle, poll_interval));
        }

        info!(
            device = device.to_string(),
            channels = channels.len(),
            settle_ms = settle.as_millis(),
            "Input sampler initialized."
        );

        Ok(InputSampler {
            device,
            channels,
            claimed: true,
        })
    }

    /// Reads every channel once and advances its debouncer. Returns one entry per channel:
    /// the channel index and whether a press was confirmed on this poll.
    pub fn poll_once(&mut self) -> Vec<(usize, bool)> {
        self.poll_once_at(Instant::now())
    }

    /// Same as `poll_once`, with the sample time supplied by the caller.
    pub fn poll_once_at(&mut self, now: Instant) -> Vec<(usize, bool)> {
        if !self.claimed {
            return self.channels.iter().map(|c| (c.index, false)).collect();
        }

        let device = &mut self.device;
        self.channels
            .iter_mut()
            .map(|channel| {
                let reading = device.read(channel.pin);
                (channel.index, channel.sample(reading, now))
            })
            .collect()
    }

    /// Releases every claimed pin. Calling it again does nothing.
    pub fn shutdown(&mut self) {
        if !self.claimed {
            return;
        }

        for channel in self.channels.iter() {
            self.device.release(channel.pin);
        }
        self.claimed = false;
        info!(channels = self.channels.len(), "Released all GPIO pins.");
    }

    /// Returns the channels in index order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Returns true while the pins are claimed.
    pub fn is_claimed(&self) -> bool {
        self.claimed
    }
}

impl Drop for InputSampler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
