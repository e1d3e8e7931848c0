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

//! Offline configuration check. Decodes every sound without touching GPIO or audio
//! hardware.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::config;
use crate::sounds::{SoundError, SoundLoader};

/// Rate used to decode when the configuration doesn't name one.
const VERIFY_SAMPLE_RATE: u32 = 44100;

/// The outcome of checking one channel.
#[derive(Debug)]
pub struct ChannelCheck {
    pub index: usize,
    pub pin: u8,
    pub path: PathBuf,
    pub result: Result<(u16, Duration), SoundError>,
}

impl fmt::Display for ChannelCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>2}  GPIO{:<3} {}",
            self.index,
            self.pin,
            self.path.display()
        )?;
        match &self.result {
            Ok((channels, duration)) => write!(
                f,
                "  ok ({} ch, {:.2}s)",
                channels,
                duration.as_secs_f64()
            ),
            Err(e) => write!(f, "  ERROR: {}", e),
        }
    }
}

/// Result of verifying a configuration.
#[derive(Debug, Default)]
pub struct VerificationReport {
    pub channels: Vec<ChannelCheck>,
}

impl VerificationReport {
    pub fn has_errors(&self) -> bool {
        self.channels.iter().any(|c| c.result.is_err())
    }
}

/// Decodes each channel's sound and reports what was found.
pub fn verify(config: &config::Soundpad) -> VerificationReport {
    let mut loader =
        SoundLoader::new(config.audio().sample_rate().unwrap_or(VERIFY_SAMPLE_RATE));

    let channels = config
        .pins()
        .iter()
        .zip(config.sounds())
        .enumerate()
        .map(|(index, (pin, path))| ChannelCheck {
            index,
            pin: *pin,
            path: path.clone(),
            result: loader
                .load(path)
                .map(|sound| (sound.channel_count(), sound.duration())),
        })
        .collect();

    VerificationReport { channels }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::write_wav;

    #[test]
    fn test_verify_reports_each_channel() -> Result<(), Box<dyn std::error::Error>> {
        let tempdir = tempfile::tempdir()?;
        let good = tempdir.path().join("good.wav");
        write_wav(&good, vec![vec![0.0; 22050], vec![0.0; 22050]], 44100)?;
        let missing = tempdir.path().join("missing.wav");

        let config = config::Soundpad::new(&[18, 19], &[good, missing]);
        let report = verify(&config);

        assert_eq!(2, report.channels.len());
        assert!(report.has_errors());
        assert!(matches!(
            report.channels[0].result,
            Ok((2, duration)) if duration == Duration::from_millis(500)
        ));
        assert!(matches!(
            report.channels[1].result,
            Err(SoundError::ResourceNotFound(_))
        ));
        assert!(report.channels[1].to_string().contains("GPIO19"));
        Ok(())
    }
}
