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
// Sums the playing clips into the interleaved output buffer.
use crossbeam_channel::Receiver;

use crate::audio::Playback;
use crate::sounds::LoadedSound;

/// A clip queued on, or playing in, the mixer.
pub struct ActiveSource {
    /// Shared with whoever started the clip.
    playback: Playback,
    sound: LoadedSound,
    /// Next frame to read from the sound.
    frame: usize,
}

impl ActiveSource {
    pub fn new(playback: Playback, sound: LoadedSound) -> ActiveSource {
        ActiveSource {
            playback,
            sound,
            frame: 0,
        }
    }
}

/// Mixing state owned by the output callback. New clips arrive over the channel so the
/// callback never blocks on a lock.
pub struct AudioMixer {
    num_channels: u16,
    sources: Vec<ActiveSource>,
    source_rx: Receiver<ActiveSource>,
}

impl AudioMixer {
    /// Creates a new audio mixer
    pub fn new(num_channels: u16, source_rx: Receiver<ActiveSource>) -> AudioMixer {
        AudioMixer {
            num_channels,
            sources: Vec::new(),
            source_rx,
        }
    }

    /// Fills `output` with interleaved frames of every playing clip. Stopped clips are
    /// dropped before they contribute, and clips that run out are marked finished.
    pub fn process_into(&mut self, output: &mut [f32]) {
        while let Ok(source) = self.source_rx.try_recv() {
            self.sources.push(source);
        }

        output.fill(0.0);

        let num_channels = self.num_channels as usize;
        if num_channels == 0 {
            return;
        }
        let frames = output.len() / num_channels;

        self.sources.retain_mut(|source| {
            if !source.playback.is_playing() {
                return false;
            }

            let source_channels = source.sound.channel_count() as usize;
            let samples = source.sound.samples();
            let remaining = source.sound.frames().saturating_sub(source.frame);
            let count = frames.min(remaining);

            for i in 0..count {
                let start = (source.frame + i) * source_channels;
                let input = &samples[start..start + source_channels];
                let out = &mut output[i * num_channels..(i + 1) * num_channels];
                for (channel, sample) in out.iter_mut().enumerate() {
                    // Mono is copied to every output; wider clips wrap around.
                    *sample += input[channel % source_channels];
                }
            }
            source.frame += count;

            if source.frame >= source.sound.frames() {
                source.playback.finish();
                return false;
            }
            true
        });

        for sample in output.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }

    /// Returns the number of clips still in the mix.
    pub fn active_count(&self) -> usize {
        self.sources.len()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn sound(samples: Vec<f32>, channel_count: u16) -> LoadedSound {
        LoadedSound::new(PathBuf::from("test.wav"), samples, channel_count, 44100)
    }

    fn mixer(num_channels: u16) -> (crossbeam_channel::Sender<ActiveSource>, AudioMixer) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (tx, AudioMixer::new(num_channels, rx))
    }

    #[test]
    fn test_silence_without_sources() {
        let (_tx, mut mixer) = mixer(2);
        let mut output = vec![1.0; 8];
        mixer.process_into(&mut output);
        assert_eq!(vec![0.0; 8], output);
    }

    #[test]
    fn test_mono_is_copied_to_every_channel() {
        let (tx, mut mixer) = mixer(2);
        let playback = Playback::new();
        tx.send(ActiveSource::new(
            playback.clone(),
            sound(vec![0.1, 0.2, 0.3], 1),
        ))
        .expect("send");

        let mut output = vec![0.0; 4];
        mixer.process_into(&mut output);
        assert_eq!(vec![0.1, 0.1, 0.2, 0.2], output);
        assert!(playback.is_playing());

        mixer.process_into(&mut output);
        assert_eq!(vec![0.3, 0.3, 0.0, 0.0], output);
        assert!(!playback.is_playing());
        assert!(!playback.is_stopped());
        assert_eq!(0, mixer.active_count());
    }

    #[test]
    fn test_sources_are_summed_and_clamped() {
        let (tx, mut mixer) = mixer(1);
        for _ in 0..2 {
            tx.send(ActiveSource::new(Playback::new(), sound(vec![0.25, 0.75], 1)))
                .expect("send");
        }

        let mut output = vec![0.0; 2];
        mixer.process_into(&mut output);
        assert_eq!(vec![0.5, 1.0], output);
    }

    #[test]
    fn test_stopped_source_is_dropped() {
        let (tx, mut mixer) = mixer(1);
        let playback = Playback::new();
        tx.send(ActiveSource::new(playback.clone(), sound(vec![0.5; 16], 1)))
            .expect("send");

        let mut output = vec![0.0; 4];
        mixer.process_into(&mut output);
        assert_eq!(1, mixer.active_count());

        playback.stop();
        mixer.process_into(&mut output);
        assert_eq!(vec![0.0; 4], output);
        assert_eq!(0, mixer.active_count());
    }

    #[test]
    fn test_stereo_into_four_channels() {
        let (tx, mut mixer) = mixer(4);
        tx.send(ActiveSource::new(Playback::new(), sound(vec![0.1, -0.1], 2)))
            .expect("send");

        let mut output = vec![0.0; 4];
        mixer.process_into(&mut output);
        assert_eq!(vec![0.1, -0.1, 0.1, -0.1], output);
    }
}
