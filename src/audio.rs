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
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use std::{error::Error, fmt};

use crate::config;
use crate::playsync::CancelHandle;
use crate::sounds::LoadedSound;

pub mod cpal;
pub mod mixer;
pub mod mock;

/// Global counter for playback IDs.
static NEXT_PLAYBACK_ID: AtomicU64 = AtomicU64::new(1);

/// An audio output that plays decoded sounds in the background.
pub trait Device: fmt::Display + Send + Sync {
    /// The output sample rate. Sounds are resampled to this rate when they are loaded.
    fn sample_rate(&self) -> u32;

    /// Starts playing the sound and returns without waiting for it to finish.
    fn play(&self, sound: &LoadedSound) -> Result<Playback, Box<dyn Error>>;

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Device>, Box<dyn Error>>;
}

/// A handle to one running clip. The backend marks it finished when the clip runs out;
/// anyone holding a clone can stop it early.
#[derive(Clone)]
pub struct Playback {
    id: u64,
    cancel_handle: CancelHandle,
    finished: Arc<AtomicBool>,
}

impl Playback {
    /// Creates a handle for a clip that is about to start.
    pub fn new() -> Playback {
        Playback {
            id: NEXT_PLAYBACK_ID.fetch_add(1, Ordering::Relaxed),
            cancel_handle: CancelHandle::new(),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the unique ID of this playback.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns true until the clip has finished or been stopped.
    pub fn is_playing(&self) -> bool {
        !self.finished.load(Ordering::Relaxed) && !self.cancel_handle.is_cancelled()
    }

    /// Returns true if the clip was stopped before it finished.
    pub fn is_stopped(&self) -> bool {
        self.cancel_handle.is_cancelled()
    }

    /// Stops the clip.
    pub fn stop(&self) {
        self.cancel_handle.cancel();
    }

    /// Marks the clip as played to the end. Called by the backend.
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Relaxed);
        self.cancel_handle.notify();
    }

    /// Blocks until the clip finishes or is stopped.
    #[cfg(test)]
    pub fn wait(&self) {
        self.cancel_handle.wait(self.finished.clone());
    }

    /// Blocks for up to `timeout` unless the clip is stopped first. Returns true if it was
    /// stopped.
    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        self.cancel_handle.sleep(timeout)
    }
}

impl Default for Playback {
    fn default() -> Self {
        Playback::new()
    }
}

/// Lists the output devices known to cpal.
pub fn list_devices() -> Result<Vec<cpal::DeviceInfo>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets the output device described by the configuration.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device)));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}
