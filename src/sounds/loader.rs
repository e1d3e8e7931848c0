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

//! Sound loading and caching.
//!
//! Sounds are decoded entirely into memory at startup so a press never waits on disk.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, warn};

use super::SoundError;

/// A decoded clip. The sample data is stored in an Arc so the mixer can read it without
/// copying.
#[derive(Clone)]
pub struct LoadedSound {
    /// The file the clip was decoded from.
    path: PathBuf,
    /// Interleaved f32 samples.
    data: Arc<Vec<f32>>,
    /// Number of channels in the clip.
    channel_count: u16,
    /// Sample rate of the audio data.
    sample_rate: u32,
}

impl LoadedSound {
    pub fn new(
        path: PathBuf,
        samples: Vec<f32>,
        channel_count: u16,
        sample_rate: u32,
    ) -> LoadedSound {
        LoadedSound {
            path,
            data: Arc::new(samples),
            channel_count,
            sample_rate,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.data.len() / usize::from(self.channel_count.max(1))
    }

    /// Returns how long the clip plays for.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

/// Decodes sound files and caches them by path.
pub struct SoundLoader {
    /// Cache of loaded sounds by file path.
    cache: HashMap<PathBuf, LoadedSound>,
    /// Target sample rate for transcoding (matches audio output).
    target_sample_rate: u32,
}

impl SoundLoader {
    pub fn new(target_sample_rate: u32) -> SoundLoader {
        SoundLoader {
            cache: HashMap::new(),
            target_sample_rate,
        }
    }

    /// Loads a sound into memory, resampled to the target rate. Returns the cached copy if
    /// the path was loaded before.
    pub fn load(&mut self, path: &Path) -> Result<LoadedSound, SoundError> {
        if let Some(sound) = self.cache.get(path) {
            debug!(path = ?path, "Using cached sound");
            return Ok(sound.clone());
        }

        if !path.exists() {
            return Err(SoundError::ResourceNotFound(path.to_path_buf()));
        }

        let (samples, channel_count, source_sample_rate) = decode(path)?;

        let samples = if source_sample_rate != self.target_sample_rate {
            info!(
                path = ?path,
                source_rate = source_sample_rate,
                target_rate = self.target_sample_rate,
                "Transcoding sound"
            );
            transcode(
                &samples,
                channel_count,
                source_sample_rate,
                self.target_sample_rate,
            )
        } else {
            samples
        };

        let loaded = LoadedSound::new(
            path.to_path_buf(),
            samples,
            channel_count,
            self.target_sample_rate,
        );

        info!(
            path = ?path,
            channels = channel_count,
            sample_rate = loaded.sample_rate(),
            duration_ms = loaded.duration().as_millis(),
            memory_kb = loaded.memory_size() / 1024,
            "Sound loaded"
        );

        self.cache.insert(path.to_path_buf(), loaded.clone());
        Ok(loaded)
    }

    /// Returns the number of distinct files decoded so far.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Returns the total memory used by cached sounds.
    pub fn total_memory_usage(&self) -> usize {
        self.cache.values().map(|s| s.memory_size()).sum()
    }
}

impl std::fmt::Debug for SoundLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundLoader")
            .field("cached_sounds", &self.cache.len())
            .field("target_sample_rate", &self.target_sample_rate)
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}

/// Decodes the first audio track of a file into interleaved f32 samples. Returns the
/// samples, the channel count and the file's sample rate.
fn decode(path: &Path) -> Result<(Vec<f32>, u16, u32), SoundError> {
    let unsupported = |reason: String| SoundError::UnsupportedFormat {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => SoundError::ResourceNotFound(path.to_path_buf()),
        _ => unsupported(e.to_string()),
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Give the format registry a hint from the extension.
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| unsupported(e.to_string()))?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| unsupported("no audio track found".to_string()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| unsupported("sample rate not specified".to_string()))?;
    let mut channel_count = track
        .codec_params
        .channels
        .map(|channels| channels.count() as u16)
        .unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| unsupported(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(unsupported(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // A corrupt packet is skipped, the rest of the file may be fine.
                warn!(path = ?path, err = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(unsupported(e.to_string())),
        };

        let spec = *decoded.spec();
        if channel_count == 0 {
            channel_count = spec.channels.count() as u16;
        }
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    if channel_count == 0 || samples.is_empty() {
        return Err(unsupported("no audio data".to_string()));
    }

    Ok((samples, channel_count, sample_rate))
}

/// Transcodes samples from one sample rate to another using linear interpolation. Good
/// enough for short one-shot clips.
fn transcode(samples: &[f32], channel_count: u16, source_rate: u32, target_rate: u32) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let channels = channel_count as usize;
    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames * channels);
    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let s0 = samples
                .get(source_frame * channels + channel)
                .copied()
                .unwrap_or(0.0);
            let s1 = samples
                .get((source_frame + 1) * channels + channel)
                .copied()
                .unwrap_or(s0);
            output.push(s0 + (s1 - s0) * frac);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::testutil::write_wav;

    #[test]
    fn test_load_wav() -> Result<(), Box<dyn std::error::Error>> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("click.wav");
        write_wav(&path, vec![vec![0.5, -0.5, 0.25, 0.0]], 44100)?;

        let mut loader = SoundLoader::new(44100);
        let sound = loader.load(&path)?;
        assert_eq!(1, sound.channel_count());
        assert_eq!(44100, sound.sample_rate());
        assert_eq!(&[0.5, -0.5, 0.25, 0.0], sound.samples());
        assert_eq!(path.as_path(), sound.path());
        Ok(())
    }

    #[test]
    fn test_stereo_is_interleaved() -> Result<(), Box<dyn std::error::Error>> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("stereo.wav");
        write_wav(&path, vec![vec![0.1, 0.2], vec![-0.1, -0.2]], 48000)?;

        let sound = SoundLoader::new(48000).load(&path)?;
        assert_eq!(2, sound.channel_count());
        assert_eq!(2, sound.frames());
        assert_eq!(&[0.1, -0.1, 0.2, -0.2], sound.samples());
        Ok(())
    }

    #[test]
    fn test_cache_by_path() -> Result<(), Box<dyn std::error::Error>> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("shared.wav");
        write_wav(&path, vec![vec![0.0; 64]], 44100)?;

        let mut loader = SoundLoader::new(44100);
        let first = loader.load(&path)?;
        let second = loader.load(&path)?;
        assert_eq!(1, loader.cached_count());
        assert!(Arc::ptr_eq(&first.data, &second.data));
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let mut loader = SoundLoader::new(44100);
        let path = PathBuf::from("/nonexistent/sound1.wav");
        assert!(matches!(
            loader.load(&path),
            Err(SoundError::ResourceNotFound(missing)) if missing == path
        ));
    }

    #[test]
    fn test_not_audio() -> Result<(), Box<dyn std::error::Error>> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("notes.wav");
        fs::write(&path, "this is not a wav file")?;

        let mut loader = SoundLoader::new(44100);
        assert!(matches!(
            loader.load(&path),
            Err(SoundError::UnsupportedFormat { .. })
        ));
        assert_eq!(0, loader.cached_count());
        Ok(())
    }

    #[test]
    fn test_load_resamples_to_target_rate() -> Result<(), Box<dyn std::error::Error>> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("low.wav");
        write_wav(&path, vec![vec![0.0; 2205]], 22050)?;

        let sound = SoundLoader::new(44100).load(&path)?;
        assert_eq!(44100, sound.sample_rate());
        assert_eq!(4410, sound.frames());
        assert_eq!(Duration::from_millis(100), sound.duration());
        Ok(())
    }

    #[test]
    fn test_transcode_interpolates() {
        let result = transcode(&[0.0, 1.0], 1, 1, 2);
        assert_eq!(vec![0.0, 0.5, 1.0, 1.0], result);
    }

    #[test]
    fn test_transcode_stereo() {
        // Stereo: L=1.0, R=-1.0 throughout.
        let source = vec![1.0f32, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        let result = transcode(&source, 2, 44100, 48000);

        assert_eq!(0, result.len() % 2);
        for frame in result.chunks(2) {
            assert!((frame[0] - 1.0).abs() < 1e-6);
            assert!((frame[1] + 1.0).abs() < 1e-6);
        }
    }
}
