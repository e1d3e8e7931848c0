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
use std::{error::Error, fmt, path::PathBuf, sync::Arc, thread};

use parking_lot::Mutex;
use tracing::{info, span, Level};

use crate::audio::Playback;
use crate::sounds::LoadedSound;

/// Sample rate the mock pretends to run at.
const MOCK_SAMPLE_RATE: u32 = 44100;

/// A mock device. Doesn't actually play anything, but each clip "plays" for its real
/// duration so playback state behaves like the real thing.
#[derive(Clone)]
pub struct Device {
    name: String,
    plays: Arc<Mutex<Vec<(PathBuf, Playback)>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            plays: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the paths of every clip started so far, oldest first.
    pub fn played(&self) -> Vec<PathBuf> {
        self.plays.lock().iter().map(|(path, _)| path.clone()).collect()
    }

    /// Returns the handles of every clip started so far, oldest first.
    pub fn playbacks(&self) -> Vec<Playback> {
        self.plays
            .lock()
            .iter()
            .map(|(_, playback)| playback.clone())
            .collect()
    }

    /// Returns true if any clip is still playing.
    pub fn is_playing(&self) -> bool {
        self.plays
            .lock()
            .iter()
            .any(|(_, playback)| playback.is_playing())
    }
}

impl crate::audio::Device for Device {
    fn sample_rate(&self) -> u32 {
        MOCK_SAMPLE_RATE
    }

    fn play(&self, sound: &LoadedSound) -> Result<Playback, Box<dyn Error>> {
        let span = span!(Level::INFO, "play sound (mock)");
        let _enter = span.enter();

        info!(
            device = self.name,
            sound = sound.path().display().to_string(),
            duration = format!("{:?}", sound.duration()),
            "Playing sound."
        );

        let playback = Playback::new();
        {
            let playback = playback.clone();
            let duration = sound.duration();
            // Expire at the end of the clip unless stopped first.
            thread::spawn(move || {
                if !playback.wait_stopped(duration) {
                    playback.finish();
                }
            });
        }

        self.plays
            .lock()
            .push((sound.path().to_path_buf(), playback.clone()));
        Ok(playback)
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
