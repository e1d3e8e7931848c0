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
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use super::audio::Audio;
use super::error::ConfigError;

/// Pins used when no configuration file exists.
const DEFAULT_PINS: [u8; 5] = [18, 19, 20, 21, 26];
const DEFAULT_SETTLE: Duration = Duration::from_millis(30);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
const DEFAULT_GPIO: &str = "rppal";

/// What to do when a channel's sound can't be loaded.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SoundErrorPolicy {
    /// Run without a sound on that channel.
    #[default]
    Disable,
    /// Refuse to start.
    Abort,
}

/// The configuration for the sound pad.
#[derive(Deserialize, Clone)]
pub struct Soundpad {
    /// BCM pin numbers. Channel i reads pins[i].
    pins: Vec<u8>,

    /// Sound files. Channel i plays sounds[i].
    sounds: Vec<PathBuf>,

    /// How long a level must hold before it counts.
    settle: Option<String>,

    /// Time between polls.
    poll_interval: Option<String>,

    #[serde(default)]
    on_sound_error: SoundErrorPolicy,

    /// The GPIO backend.
    gpio: Option<String>,

    #[serde(default)]
    audio: Audio,
}

impl Soundpad {
    /// Creates a new configuration with default timing and backends.
    pub fn new(pins: &[u8], sounds: &[PathBuf]) -> Soundpad {
        Soundpad {
            pins: pins.to_vec(),
            sounds: sounds.to_vec(),
            settle: None,
            poll_interval: None,
            on_sound_error: SoundErrorPolicy::default(),
            gpio: None,
            audio: Audio::default(),
        }
    }

    /// The built-in configuration: five buttons playing `sounds/sound1.wav` through
    /// `sounds/sound5.wav`.
    pub fn default_config() -> Soundpad {
        let sounds: Vec<PathBuf> = (1..=DEFAULT_PINS.len())
            .map(|i| PathBuf::from(format!("sounds/sound{}.wav", i)))
            .collect();
        Soundpad::new(&DEFAULT_PINS, &sounds)
    }

    /// Parses and validates a configuration from a YAML file. Relative sound paths are
    /// resolved against the file's directory.
    pub fn deserialize(path: &Path) -> Result<Soundpad, ConfigError> {
        let mut soundpad = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Soundpad>()?;

        if let Some(base) = path.parent() {
            soundpad.sounds = soundpad
                .sounds
                .into_iter()
                .map(|sound| {
                    if sound.is_absolute() {
                        sound
                    } else {
                        base.join(sound)
                    }
                })
                .collect();
        }

        soundpad.validate()?;
        Ok(soundpad)
    }

    /// Checks the channel lists and timing values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pins.len() != self.sounds.len() {
            return Err(ConfigError::LengthMismatch {
                pins: self.pins.len(),
                sounds: self.sounds.len(),
            });
        }
        if self.pins.is_empty() {
            return Err(ConfigError::Empty);
        }

        let mut seen = HashSet::new();
        for pin in self.pins.iter() {
            if !seen.insert(*pin) {
                return Err(ConfigError::DuplicatePin(*pin));
            }
        }

        self.settle()?;
        if self.poll_interval()?.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    /// Returns the pins in channel order.
    pub fn pins(&self) -> &[u8] {
        &self.pins
    }

    /// Returns the sound files in channel order.
    pub fn sounds(&self) -> &[PathBuf] {
        &self.sounds
    }

    /// Returns the settle duration (default: 30ms).
    pub fn settle(&self) -> Result<Duration, ConfigError> {
        parse_duration("settle", self.settle.as_deref(), DEFAULT_SETTLE)
    }

    /// Returns the poll interval (default: 10ms).
    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        parse_duration(
            "poll_interval",
            self.poll_interval.as_deref(),
            DEFAULT_POLL_INTERVAL,
        )
    }

    pub fn on_sound_error(&self) -> SoundErrorPolicy {
        self.on_sound_error
    }

    /// Returns the GPIO backend name (default: rppal).
    pub fn gpio(&self) -> &str {
        self.gpio.as_deref().unwrap_or(DEFAULT_GPIO)
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    /// Uses the given GPIO backend.
    pub fn with_gpio(mut self, gpio: &str) -> Soundpad {
        self.gpio = Some(gpio.to_string());
        self
    }

    /// Uses the given audio configuration.
    pub fn with_audio(mut self, audio: Audio) -> Soundpad {
        self.audio = audio;
        self
    }

    pub fn with_on_sound_error(mut self, policy: SoundErrorPolicy) -> Soundpad {
        self.on_sound_error = policy;
        self
    }
}

fn parse_duration(
    field: &'static str,
    value: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => Ok(DurationString::from_string(value.to_string())
            .map_err(|e| ConfigError::InvalidDuration {
                field,
                reason: e.to_string(),
            })?
            .into()),
        None => Ok(default),
    }
}
