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
    sync::{mpsc, Arc},
    thread,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{debug, error, info, span, Level};

use crate::{
    audio::{Device as AudioDevice, DEFAULT_DEVICE},
    instrument::Instrument,
    playsync::CancelHandle,
};

/// A small wrapper around a cpal output device. The underlying device is looked up
/// lazily so that a missing device only surfaces when the output is started.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports. Zero if unknown.
    max_channels: u16,
    /// The host the device was listed from, if any.
    host_id: Option<cpal::HostId>,
    /// The running output stream.
    output: Mutex<Option<OutputStream>>,
}

/// Keeps the output thread, and with it the cpal stream, alive.
struct OutputStream {
    cancel_handle: CancelHandle,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        self.cancel_handle.cancel();
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.join().is_err() {
                error!("Audio output thread panicked.");
            }
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.host_id {
            Some(host_id) => write!(
                f,
                "{} (Channels={}) ({})",
                self.name,
                self.max_channels,
                host_id.name()
            ),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Integer callback: render into a scratch buffer and convert.
fn create_converting_callback<T: cpal::SizedSample + cpal::FromSample<f32>>(
    instrument: Arc<dyn Instrument>,
    channels: usize,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static {
    let mut scratch: Vec<f32> = Vec::new();
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        scratch.resize(data.len(), 0.0);
        instrument.render(&mut scratch, channels);

        for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

fn build_converted_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    instrument: Arc<dyn Instrument>,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    let mut callback = create_converting_callback::<T>(instrument, config.channels as usize);
    device.build_output_stream(
        config,
        move |data: &mut [T], info: &cpal::OutputCallbackInfo| callback(data, info),
        |err| error!("CPAL output stream error: {}", err),
        None,
    )
}

/// Returns true if the device can output the given channel count at the given rate.
/// Devices that can't enumerate their configurations are given the benefit of the doubt.
fn supports_rate(device: &cpal::Device, channels: cpal::ChannelCount, sample_rate: u32) -> bool {
    match device.supported_output_configs() {
        Ok(mut configs) => configs.any(|range| {
            range.channels() == channels
                && range.min_sample_rate().0 <= sample_rate
                && sample_rate <= range.max_sample_rate().0
        }),
        Err(e) => {
            debug!(err = e.to_string(), "Unable to list output configurations.");
            true
        }
    }
}

/// Builds an output stream that renders the instrument in the device's native format.
fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    instrument: Arc<dyn Instrument>,
) -> Result<cpal::Stream, Box<dyn Error>> {
    let channels = config.channels as usize;
    let stream = match sample_format {
        cpal::SampleFormat::F32 => device.build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                instrument.render(data, channels);
            },
            |err| error!("CPAL output stream error: {}", err),
            None,
        )?,
        cpal::SampleFormat::I16 => build_converted_stream::<i16>(device, config, instrument)?,
        cpal::SampleFormat::I32 => build_converted_stream::<i32>(device, config, instrument)?,
        cpal::SampleFormat::U16 => build_converted_stream::<u16>(device, config, instrument)?,
        other => return Err(format!("unsupported sample format {:?}", other).into()),
    };

    Ok(stream)
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
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
                let output_configs = match device.supported_output_configs() {
                    Ok(output_configs) => output_configs,
                    Err(_) => continue,
                };
                let max_channels = output_configs
                    .map(|output_config| output_config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(Device {
                        name: device.name()?,
                        max_channels,
                        host_id: Some(host_id),
                        output: Mutex::new(None),
                    });
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Gets the given cpal device. Nothing is opened until the device is started.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            max_channels: 0,
            host_id: None,
            output: Mutex::new(None),
        }
    }

    /// Finds the underlying cpal device by name.
    fn find(&self) -> Result<cpal::Device, Box<dyn Error>> {
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        if self.name == DEFAULT_DEVICE {
            return cpal::default_host()
                .default_output_device()
                .ok_or_else(|| "no default output device".into());
        }

        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(_) => continue,
            };

            for device in host_devices {
                if device.name()?.trim() == self.name {
                    return Ok(device);
                }
            }
        }

        Err(format!("no device found with name {}", self.name).into())
    }
}

impl AudioDevice for Device {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self, instrument: Arc<dyn Instrument>) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "start output (cpal)");
        let _enter = span.enter();

        let mut output = self.output.lock();
        if output.is_some() {
            return Ok(());
        }

        let device = self.find()?;
        let default_config = device.default_output_config()?;
        let sample_format = default_config.sample_format();
        if !supports_rate(&device, default_config.channels(), instrument.sample_rate()) {
            return Err(format!(
                "{} can't output {}Hz (default is {}Hz)",
                self.name,
                instrument.sample_rate(),
                default_config.sample_rate().0
            )
            .into());
        }
        let config = cpal::StreamConfig {
            channels: default_config.channels(),
            sample_rate: cpal::SampleRate(instrument.sample_rate()),
            buffer_size: cpal::BufferSize::Default,
        };
        let channels = config.channels;
        let sample_rate = config.sample_rate.0;

        let cancel_handle = CancelHandle::new();
        let (started_tx, started_rx) = mpsc::channel::<Result<(), String>>();

        // The stream can't cross threads, so it is created and held by the output thread.
        let join_handle = {
            let cancel_handle = cancel_handle.clone();
            thread::Builder::new()
                .name("audio-output".to_string())
                .spawn(move || {
                    let stream = match build_stream(&device, &config, sample_format, instrument) {
                        Ok(stream) => stream,
                        Err(e) => {
                            let _ = started_tx.send(Err(e.to_string()));
                            return;
                        }
                    };
                    if let Err(e) = stream.play() {
                        let _ = started_tx.send(Err(e.to_string()));
                        return;
                    }
                    let _ = started_tx.send(Ok(()));

                    cancel_handle.wait();
                    drop(stream);
                })?
        };

        let started = started_rx
            .recv()
            .unwrap_or_else(|_| Err("output thread exited before starting".to_string()));
        if let Err(e) = started {
            let _ = join_handle.join();
            return Err(format!("unable to start output on {}: {}", self.name, e).into());
        }

        info!(
            device = self.name,
            channels,
            sample_rate,
            format = format!("{:?}", sample_format),
            "Output stream started."
        );
        *output = Some(OutputStream {
            cancel_handle,
            join_handle: Some(join_handle),
        });
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.output
            .lock()
            .as_ref()
            .is_some_and(|output| !output.cancel_handle.is_done())
    }

    fn preferred_sample_rate(&self) -> Option<u32> {
        let config = self.find().ok()?.default_output_config().ok()?;
        Some(config.sample_rate().0)
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<super::mock::Device>, Box<dyn Error>> {
        Err("not a mock".into())
    }
}
