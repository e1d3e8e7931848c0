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

//! The running sound pad: one loop that samples every button, plays the sound of any
//! button that was just pressed and sleeps until the next poll.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, span, warn, Level};

use crate::config::{self, SoundErrorPolicy};
use crate::playsync::CancelHandle;
use crate::sampler::InputSampler;
use crate::sounds::{SoundDispatcher, SoundError};
use crate::{audio, gpio};

/// Holds every hardware claim the service makes. Dropping it releases the pins and stops
/// any playback.
pub struct Soundpad {
    sampler: InputSampler,
    dispatcher: SoundDispatcher,
    poll_interval: Duration,
    /// Cancelling this ends the loop.
    cancel_handle: CancelHandle,
    shut_down: bool,
}

impl Soundpad {
    pub fn new(
        sampler: InputSampler,
        dispatcher: SoundDispatcher,
        poll_interval: Duration,
    ) -> Soundpad {
        Soundpad {
            sampler,
            dispatcher,
            poll_interval,
            cancel_handle: CancelHandle::new(),
            shut_down: false,
        }
    }

    /// Opens the configured audio output and GPIO backend, loads every sound and claims
    /// every pin.
    pub fn from_config(config: &config::Soundpad) -> Result<Soundpad, Box<dyn Error>> {
        let audio_device = audio::get_device(config.audio())?;
        let gpio_device = gpio::get_device(config.gpio());
        Soundpad::with_devices(config, gpio_device, audio_device)
    }

    /// Same as `from_config` with the devices supplied by the caller.
    pub fn with_devices(
        config: &config::Soundpad,
        gpio_device: Box<dyn gpio::Device>,
        audio_device: Arc<dyn audio::Device>,
    ) -> Result<Soundpad, Box<dyn Error>> {
        let span = span!(Level::INFO, "soundpad");
        let _enter = span.enter();

        let settle = config.settle()?;
        let poll_interval = config.poll_interval()?;

        // Sounds first: under the abort policy nothing should be claimed on failure.
        let dispatcher = bind_sounds(config, audio_device)?;
        let sampler = InputSampler::initialize(gpio_device, config.pins(), settle, poll_interval)?;

        info!(
            channels = config.pins().len(),
            poll_interval_ms = poll_interval.as_millis(),
            "Sound pad ready."
        );
        Ok(Soundpad::new(sampler, dispatcher, poll_interval))
    }

    /// Returns a handle that stops the loop when cancelled.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel_handle.clone()
    }

    /// Runs until the cancel handle is cancelled, then releases everything. A cancel
    /// during the inter-poll sleep wakes the loop immediately.
    pub fn run(mut self) {
        let span = span!(Level::INFO, "soundpad loop");
        let _enter = span.enter();

        info!("Polling buttons.");
        while !self.cancel_handle.is_cancelled() {
            self.poll_and_dispatch();
            if self.cancel_handle.sleep(self.poll_interval) {
                break;
            }
        }

        info!("Stopping.");
        self.shutdown();
    }

    /// Samples every button once and starts the sound of each new press.
    pub fn poll_and_dispatch(&mut self) {
        for (index, pressed) in self.sampler.poll_once() {
            if !pressed {
                continue;
            }
            if let Err(e) = self.dispatcher.play(index) {
                warn!(channel = index, err = %e, "Unable to play sound.");
            }
        }
    }

    /// Releases every pin and stops all playback. Calling it again does nothing.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.sampler.shutdown();
        self.dispatcher.stop_all();
        self.shut_down = true;
    }

    pub fn sampler(&self) -> &InputSampler {
        &self.sampler
    }

    pub fn dispatcher(&self) -> &SoundDispatcher {
        &self.dispatcher
    }
}

impl Drop for Soundpad {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Loads each channel's sound. A failure either disables the channel or aborts, as the
/// configuration says.
fn bind_sounds(
    config: &config::Soundpad,
    device: Arc<dyn audio::Device>,
) -> Result<SoundDispatcher, SoundError> {
    let mut dispatcher = SoundDispatcher::new(device, config.sounds().len());
    for (index, path) in config.sounds().iter().enumerate() {
        let Err(e) = dispatcher.bind(index, path) else {
            continue;
        };
        match config.on_sound_error() {
            SoundErrorPolicy::Abort => return Err(e),
            SoundErrorPolicy::Disable => warn!(
                channel = index,
                pin = config.pins().get(index).copied(),
                err = %e,
                "Sound unavailable, channel disabled."
            ),
        }
    }
    Ok(dispatcher)
}
