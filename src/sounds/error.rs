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
use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading or playing sounds.
#[derive(Debug, Error)]
pub enum SoundError {
    #[error("sound file {} not found", .0.display())]
    ResourceNotFound(PathBuf),

    #[error("unable to decode {}: {reason}", path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },

    #[error("channel {0} does not exist")]
    UnknownChannel(usize),

    #[error("channel {0} has no sound bound")]
    NotBound(usize),

    #[error("audio device error: {0}")]
    Device(String),
}
