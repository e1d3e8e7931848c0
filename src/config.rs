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
use std::path::Path;

use tracing::info;

mod audio;
mod error;
mod soundpad;

pub use audio::Audio;
pub use error::ConfigError;
pub use soundpad::{SoundErrorPolicy, Soundpad};

/// Where the service looks for its configuration when none is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/soundpad.yaml";

/// Loads the configuration. An explicitly given file must exist. Without one, the default
/// path is tried and the built-in defaults are used if it isn't there.
pub fn load(path: Option<&Path>) -> Result<Soundpad, ConfigError> {
    if let Some(path) = path {
        return Soundpad::deserialize(path);
    }

    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        return Soundpad::deserialize(default_path);
    }

    info!(
        path = DEFAULT_CONFIG_PATH,
        "No configuration found, using built-in defaults."
    );
    let config = Soundpad::default_config();
    config.validate()?;
    Ok(config)
}
