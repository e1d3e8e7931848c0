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
use std::{
    error::Error,
    fmt,
    sync::{atomic::AtomicBool, Arc},
    thread,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, info, span, Level};

use crate::audio::mixer::{ActiveSource, AudioMixer};
use crate::audio::{Device as AudioDevice, Playback};
use crate::{config, playsync::CancelHandle, sounds::LoadedSound};

/// An output device as reported by `soundpad devices`.
pub struct DeviceInfo {
    name: String,
    host_id: cpal::HostId,
    max_channels: u16,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// A cpal output with a continuously running stream. Clips are handed to the stream's
/// mixer and play until they end or are stopped.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// Channels of the running stream.
    channels: u16,
    /// Sample rate of the running stream.
    sample_rate: u32,
    /// The output stream manager.
    output_manager: OutputManager,
}

/// Owns the thread that keeps the cpal stream alive.
struct OutputManager {
    /// Sends new clips to the mixer inside the stream callback.
    source_tx: crossbeam_channel::Sender<ActiveSource>,
    /// Cancelled when the device is dropped, which stops the stream.
    shutdown: CancelHandle,
    /// Handle to the output thread.
    output_thread: Option<thread::JoinHandle<()>>,
}

impl OutputManager {
    /// Starts the output thread and waits until the stream is playing. The stream is
    /// created on the thread since it can't be moved between threads.
    fn start(
        device: cpal::Device,
        stream_config: cpal::StreamConfig,
        sample_format: cpal::SampleFormat,
    ) -> Result<OutputManager, Box<dyn Error>> {
        let (source_tx, source_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let shutdown = CancelHandle::new();

        let output_thread = {
            let shutdown = shutdown.clone();
            thread::Builder::new()
                .name("soundpad-output".to_string())
                .spawn(move || {
                    let mixer = AudioMixer::new(stream_config.channels, source_rx);
                    let stream =
                        match build_stream_for_format(&device, &stream_config, sample_format, mixer)
                        {
                            Ok(stream) => stream,
                            Err(e) => {
                                let _ = ready_tx.send(Err(e));
                                return;
                            }
                        };
                    if let Err(e) = stream.play() {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                    let _ = ready_tx.send(Ok(()));

                    // Keep the stream alive until the device goes away.
                    shutdown.wait(Arc::new(AtomicBool::new(false)));
                    drop(stream);
                })?
        };

        let manager = OutputManager {
            source_tx,
            shutdown,
            output_thread: Some(output_thread),
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(manager),
            Ok(Err(e)) => Err(format!("unable to start output stream: {}", e).into()),
            Err(_) => Err("output thread exited before the stream started".into()),
        }
    }
}

impl Drop for OutputManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

/// Builds the stream for whatever sample format the device wants. Mixing always happens
/// in f32 and is converted in the callback.
fn build_stream_for_format(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    mixer: AudioMixer,
) -> Result<cpal::Stream, String> {
    let result = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, stream_config, mixer),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, stream_config, mixer),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, stream_config, mixer),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, stream_config, mixer),
        other => return Err(format!("unsupported device sample format {:?}", other)),
    };
    result.map_err(|e| e.to_string())
}

fn build_stream<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    mut mixer: AudioMixer,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device.build_output_stream(
        stream_config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            mixer.process_into(&mut scratch);
            for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                *dst = T::from_sample(src);
            }
        },
        |err| error!(err = %err, "cpal output stream error."),
        None,
    )
}

impl Device {
    /// Lists output devices across every available host.
    pub fn list() -> Result<Vec<DeviceInfo>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<DeviceInfo> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|output_config| output_config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(DeviceInfo {
                        name: device.name()?,
                        host_id,
                        max_channels,
                    });
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Finds a device by name. "default" is the default host's default output.
    fn find(name: &str) -> Result<(cpal::HostId, cpal::Device), Box<dyn Error>> {
        if name == "default" {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or("no default output device")?;
            return Ok((host.id(), device));
        }

        for host_id in cpal::available_hosts() {
            let Ok(devices) = cpal::host_from_id(host_id)?.output_devices() else {
                continue;
            };
            for device in devices {
                if device.name().is_ok_and(|device_name| device_name.trim() == name) {
                    return Ok((host_id, device));
                }
            }
        }

        Err(format!("no device found with name {}", name).into())
    }

    /// Gets the given cpal device and starts its output stream.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let span = span!(Level::INFO, "audio device (cpal)");
        let _enter = span.enter();

        let (host_id, device) = Device::find(config.device())?;
        let name = device.name()?;
        let supported = device.default_output_config()?;
        let sample_format = supported.sample_format();
        let mut stream_config = supported.config();
        if let Some(sample_rate) = config.sample_rate() {
            stream_config.sample_rate = cpal::SampleRate(sample_rate);
        }

        let channels = stream_config.channels;
        let sample_rate = stream_config.sample_rate.0;
        let output_manager = OutputManager::start(device, stream_config, sample_format)?;

        info!(
            device = name,
            host = host_id.name(),
            channels,
            sample_rate,
            format = format!("{:?}", sample_format),
            "Output stream started."
        );

        Ok(Device {
            name,
            host_id,
            channels,
            sample_rate,
            output_manager,
        })
    }
}

impl AudioDevice for Device {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn play(&self, sound: &LoadedSound) -> Result<Playback, Box<dyn Error>> {
        if sound.sample_rate() != self.sample_rate {
            return Err(format!(
                "{} is {}Hz but the device runs at {}Hz",
                sound.path().display(),
                sound.sample_rate(),
                self.sample_rate
            )
            .into());
        }

        let playback = Playback::new();
        self.output_manager
            .source_tx
            .send(ActiveSource::new(playback.clone(), sound.clone()))
            .map_err(|_| "output stream is no longer running")?;

        debug!(
            device = self.name,
            sound = sound.path().display().to_string(),
            playback = playback.id(),
            "Queued sound."
        );
        Ok(playback)
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<super::mock::Device>, Box<dyn Error>> {
        Err("not a mock".into())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.channels,
            self.host_id.name()
        )
    }
}
