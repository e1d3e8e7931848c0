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
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, span, Level};

use super::{LoadedSound, SoundError, SoundLoader};
use crate::audio::{self, Playback};

/// Whether a channel's clip is currently sounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Playing => write!(f, "playing"),
        }
    }
}

#[derive(Default)]
struct Slot {
    sound: Option<LoadedSound>,
    /// The most recent playback. It may have finished since.
    playback: Option<Playback>,
}

/// Maps channel indices to loaded sounds and starts them on the audio device.
pub struct SoundDispatcher {
    device: Arc<dyn audio::Device>,
    loader: SoundLoader,
    slots: Vec<Slot>,
}

impl SoundDispatcher {
    /// Creates a dispatcher with `channel_count` unbound channels.
    pub fn new(device: Arc<dyn audio::Device>, channel_count: usize) -> SoundDispatcher {
        let loader = SoundLoader::new(device.sample_rate());
        SoundDispatcher {
            device,
            loader,
            slots: (0..channel_count).map(|_| Slot::default()).collect(),
        }
    }

    /// Decodes the file and binds it to the channel, replacing any earlier binding.
    pub fn bind(&mut self, index: usize, path: &Path) -> Result<(), SoundError> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(SoundError::UnknownChannel(index))?;
        let sound = self.loader.load(path)?;
        info!(channel = index, path = ?path, "Bound sound.");
        slot.sound = Some(sound);
        Ok(())
    }

    /// Starts the channel's clip and returns immediately. A clip that is still playing on
    /// this channel is cut and started again from the beginning.
    pub fn play(&mut self, index: usize) -> Result<(), SoundError> {
        let span = span!(Level::INFO, "dispatch");
        let _enter = span.enter();

        let slot = self
            .slots
            .get_mut(index)
            .ok_or(SoundError::UnknownChannel(index))?;
        let sound = slot.sound.as_ref().ok_or(SoundError::NotBound(index))?;

        if let Some(previous) = slot.playback.take() {
            if previous.is_playing() {
                debug!(channel = index, playback = previous.id(), "Cutting clip.");
                previous.stop();
            }
        }

        let playback = self
            .device
            .play(sound)
            .map_err(|e| SoundError::Device(e.to_string()))?;
        info!(
            channel = index,
            sound = sound.path().display().to_string(),
            playback = playback.id(),
            "Playing sound."
        );
        slot.playback = Some(playback);
        Ok(())
    }

    /// Returns whether the channel's clip is currently sounding.
    pub fn state(&self, index: usize) -> Result<PlaybackState, SoundError> {
        let slot = self
            .slots
            .get(index)
            .ok_or(SoundError::UnknownChannel(index))?;

        Ok(match &slot.playback {
            Some(playback) if playback.is_playing() => PlaybackState::Playing,
            _ => PlaybackState::Idle,
        })
    }

    /// Stops every clip that is still playing.
    pub fn stop_all(&mut self) {
        let mut stopped = 0;
        for slot in self.slots.iter_mut() {
            if let Some(playback) = slot.playback.take() {
                if playback.is_playing() {
                    playback.stop();
                    stopped += 1;
                }
            }
        }
        info!(stopped, "Stopped all playback.");
    }

    /// Returns the number of channels, bound or not.
    pub fn channel_count(&self) -> usize {
        self.slots.len()
    }

    /// Returns the sound bound to the channel.
    pub fn sound(&self, index: usize) -> Option<&LoadedSound> {
        self.slots.get(index).and_then(|slot| slot.sound.as_ref())
    }

    /// Returns true if the channel has a sound bound.
    pub fn is_bound(&self, index: usize) -> bool {
        self.sound(index).is_some()
    }

    /// Returns the number of distinct files decoded.
    pub fn loaded_count(&self) -> usize {
        self.loader.cached_count()
    }

    #[cfg(test)]
    pub fn device(&self) -> &Arc<dyn audio::Device> {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::path::PathBuf;

    use super::*;
    use crate::testutil::{eventually, write_wav};

    /// Writes five mono clips of the given length in frames at 44.1kHz.
    fn write_sounds(dir: &Path, frames: usize) -> Result<Vec<PathBuf>, Box<dyn Error>> {
        let mut paths = Vec::new();
        for i in 1..=5 {
            let path = dir.join(format!("sound{}.wav", i));
            write_wav(&path, vec![vec![0.1 * i as f32; frames]], 44100)?;
            paths.push(path);
        }
        Ok(paths)
    }

    fn dispatcher(paths: &[PathBuf]) -> Result<SoundDispatcher, Box<dyn Error>> {
        let device = audio::get_device(&crate::config::Audio::new("mock"))?;
        let mut dispatcher = SoundDispatcher::new(device, paths.len());
        for (index, path) in paths.iter().enumerate() {
            dispatcher.bind(index, path)?;
        }
        Ok(dispatcher)
    }

    #[test]
    fn test_bind_five_channels_all_idle() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let paths = write_sounds(tempdir.path(), 441)?;
        let dispatcher = dispatcher(&paths)?;

        assert_eq!(5, dispatcher.channel_count());
        for index in 0..5 {
            assert!(dispatcher.is_bound(index));
            assert_eq!(PlaybackState::Idle, dispatcher.state(index)?);
        }
        Ok(())
    }

    #[test]
    fn test_play_uses_bound_sound() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let paths = write_sounds(tempdir.path(), 441)?;
        let mut dispatcher = dispatcher(&paths)?;
        let mock = dispatcher.device().to_mock()?;

        for index in [2, 0, 4] {
            dispatcher.play(index)?;
        }
        assert_eq!(
            vec![paths[2].clone(), paths[0].clone(), paths[4].clone()],
            mock.played()
        );
        assert_eq!(
            Some(paths[3].as_path()),
            dispatcher.sound(3).map(|s| s.path())
        );
        Ok(())
    }

    #[test]
    fn test_playing_then_idle() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        // 100ms clips.
        let paths = write_sounds(tempdir.path(), 4410)?;
        let mut dispatcher = dispatcher(&paths)?;

        dispatcher.play(1)?;
        assert_eq!(PlaybackState::Playing, dispatcher.state(1)?);
        assert_eq!(PlaybackState::Idle, dispatcher.state(0)?);

        eventually(
            || matches!(dispatcher.state(1), Ok(PlaybackState::Idle)),
            "clip never finished",
        );
        Ok(())
    }

    #[test]
    fn test_retrigger_restarts_clip() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        // One minute clips, so they are still playing when retriggered.
        let paths = write_sounds(tempdir.path(), 44100 * 60)?;
        let mut dispatcher = dispatcher(&paths)?;
        let mock = dispatcher.device().to_mock()?;

        dispatcher.play(3)?;
        dispatcher.play(3)?;
        assert_eq!(PlaybackState::Playing, dispatcher.state(3)?);

        let playbacks = mock.playbacks();
        assert_eq!(2, playbacks.len());
        assert!(playbacks[0].is_stopped());
        assert!(playbacks[1].is_playing());
        assert_eq!(vec![paths[3].clone(), paths[3].clone()], mock.played());

        dispatcher.stop_all();
        assert_eq!(PlaybackState::Idle, dispatcher.state(3)?);
        assert!(!mock.is_playing());
        Ok(())
    }

    #[test]
    fn test_channels_play_independently() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let paths = write_sounds(tempdir.path(), 44100 * 60)?;
        let mut dispatcher = dispatcher(&paths)?;

        dispatcher.play(0)?;
        dispatcher.play(1)?;
        assert_eq!(PlaybackState::Playing, dispatcher.state(0)?);
        assert_eq!(PlaybackState::Playing, dispatcher.state(1)?);

        dispatcher.stop_all();
        assert_eq!(PlaybackState::Idle, dispatcher.state(0)?);
        assert_eq!(PlaybackState::Idle, dispatcher.state(1)?);
        Ok(())
    }

    #[test]
    fn test_missing_sound_leaves_channel_unbound() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let mut paths = write_sounds(tempdir.path(), 441)?;
        paths[1] = tempdir.path().join("missing.wav");

        let device = audio::get_device(&crate::config::Audio::new("mock"))?;
        let mut dispatcher = SoundDispatcher::new(device, paths.len());
        for (index, path) in paths.iter().enumerate() {
            let result = dispatcher.bind(index, path);
            if index == 1 {
                assert!(matches!(result, Err(SoundError::ResourceNotFound(_))));
            } else {
                assert!(result.is_ok());
            }
        }

        assert!(!dispatcher.is_bound(1));
        assert!(matches!(dispatcher.play(1), Err(SoundError::NotBound(1))));
        assert!(dispatcher.play(0).is_ok());
        Ok(())
    }

    #[test]
    fn test_unknown_channel() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let paths = write_sounds(tempdir.path(), 441)?;
        let mut dispatcher = dispatcher(&paths)?;

        assert!(matches!(
            dispatcher.play(5),
            Err(SoundError::UnknownChannel(5))
        ));
        assert!(matches!(
            dispatcher.state(7),
            Err(SoundError::UnknownChannel(7))
        ));
        assert!(matches!(
            dispatcher.bind(9, &paths[0]),
            Err(SoundError::UnknownChannel(9))
        ));
        Ok(())
    }

    #[test]
    fn test_shared_file_is_decoded_once() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let paths = write_sounds(tempdir.path(), 441)?;
        let shared = vec![paths[0].clone(), paths[0].clone(), paths[1].clone()];
        let dispatcher = dispatcher(&shared)?;

        assert_eq!(2, dispatcher.loaded_count());
        Ok(())
    }
}
