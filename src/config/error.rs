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

/// Typed error for config failures so callers can tell a missing file from a bad value
/// without string matching.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config load/parse error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("{pins} pins but {sounds} sounds configured, each pin needs exactly one sound")]
    LengthMismatch { pins: usize, sounds: usize },

    #[error("no channels configured")]
    Empty,

    #[error("pin {0} is configured more than once")]
    DuplicatePin(u8),

    #[error("invalid duration for {field}: {reason}")]
    InvalidDuration { field: &'static str, reason: String },

    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
}
