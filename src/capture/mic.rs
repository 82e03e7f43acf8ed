//! Microphone capture source backed by cpal.
//!
//! Opens the configured input device at its native rate, downmixes
//! multi-channel frames to mono, and forwards each callback buffer as one
//! chunk over the source channel. The stream is kept alive for the
//! duration of the capture and dropped synchronously on stop, which ends
//! chunk delivery.

use crate::capture::transport::{SampleSource, SourceEvent};
use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc::{self, Receiver, Sender};

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// Streams int16 sample chunks from an audio input device.
pub struct MicSource {
    /// Device name, numeric index, or "default".
    device_name: String,
    /// Actual sample rate, known once the stream is up.
    sample_rate: u32,
    /// Active input stream (kept alive during capture).
    stream: Option<cpal::Stream>,
}

impl MicSource {
    /// Creates a microphone source for the given device spec.
    ///
    /// The actual sample rate is whatever the device negotiates; call
    /// `sample_rate()` after `start()` succeeded.
    pub fn new(device_name: String) -> Self {
        Self {
            device_name,
            sample_rate: 0,
            stream: None,
        }
    }

    /// Downmixes a callback buffer to mono and forwards it as one chunk.
    fn handle_audio_callback(data: &[i16], sender: &Sender<SourceEvent>, num_channels: usize) {
        let chunk: Vec<i16> = match num_channels {
            1 => data.to_vec(),
            2 => data
                .chunks_exact(2)
                .map(|pair| (((pair[0] as i32) + (pair[1] as i32)) / 2) as i16)
                .collect(),
            _ => data
                .chunks_exact(num_channels)
                .map(|frame| {
                    let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                    (sum / num_channels as i32) as i16
                })
                .collect(),
        };

        // Receiver gone means the capture already stopped; the late chunk
        // is dropped here instead of piling up.
        let _ = sender.send(SourceEvent::Chunk(chunk));
    }
}

impl SampleSource for MicSource {
    fn start(&mut self) -> Result<Receiver<SourceEvent>> {
        // Get device while suppressing ALSA library warnings
        let device = suppress_alsa_warnings(|| {
            let host = cpal::default_host();

            if self.device_name == "default" {
                host.default_input_device()
                    .ok_or_else(|| anyhow!("No audio input device available"))
            } else {
                find_device_by_name(&host, &self.device_name)
            }
        })?;

        let device_name = device
            .name()
            .unwrap_or_else(|_| "Unknown device".to_string());
        tracing::info!("Capture device: {}", device_name);

        let device_config = device.default_input_config()?;
        self.sample_rate = device_config.sample_rate().0;
        let num_channels = device_config.channels() as usize;

        tracing::debug!(
            "Device configuration: {}Hz, {} channels",
            self.sample_rate,
            num_channels
        );

        let (sender, receiver) = mpsc::channel();
        let error_sender = sender.clone();

        let stream = device.build_input_stream(
            &device_config.into(),
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                Self::handle_audio_callback(data, &sender, num_channels);
            },
            move |err| {
                tracing::error!("Audio stream error: {}", err);
                let _ = error_sender.send(SourceEvent::Fault(err.to_string()));
            },
            None,
        )?;

        stream.play()?;
        self.stream = Some(stream);

        tracing::debug!("Audio stream started");
        Ok(receiver)
    }

    fn stop(&mut self) {
        // Dropping the stream unsubscribes from the device callback.
        self.stream = None;
        tracing::debug!("Audio stream stopped");
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn describe(&self) -> String {
        format!("microphone: {}", self.device_name)
    }
}

/// Finds an audio input device by name or numeric index.
///
/// # Arguments
/// * `host` - The cpal audio host
/// * `device_spec` - Either "default" for system default, a device name, or a numeric index (0, 1, 2, etc.)
///
/// # Errors
/// - If no device with the specified name/index is found
fn find_device_by_name(host: &cpal::Host, device_spec: &str) -> Result<cpal::Device> {
    // Try to parse as a numeric index first
    if let Ok(index) = device_spec.parse::<usize>() {
        let devices: Vec<_> = host
            .input_devices()
            .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?
            .collect();

        if index < devices.len() {
            return Ok(devices.into_iter().nth(index).unwrap());
        } else {
            return Err(anyhow!(
                "Device index {} is out of range (0-{})",
                index,
                devices.len().saturating_sub(1)
            ));
        }
    }

    // Try to find by name
    let devices = host
        .input_devices()
        .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?;

    for device in devices {
        if let Ok(name) = device.name() {
            if name == device_spec {
                return Ok(device);
            }
        }
    }

    Err(anyhow!(
        "Audio input device '{device_spec}' not found. Use 'auscult list-devices' to see available devices."
    ))
}

/// Temporarily redirects stderr to /dev/null to suppress ALSA library warnings on Linux.
/// On non-Linux platforms, this is a no-op since ALSA doesn't exist.
#[cfg(target_os = "linux")]
fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    // Open /dev/null for writing
    let dev_null = OpenOptions::new()
        .write(true)
        .open("/dev/null")
        .map_err(|e| anyhow!("Failed to open /dev/null: {e}"))?;

    let dev_null_fd = dev_null.as_raw_fd();

    // Save the current stderr file descriptor
    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return Err(anyhow!("Failed to duplicate stderr"));
    }

    // Redirect stderr to /dev/null
    let redirect_result = unsafe { libc::dup2(dev_null_fd, libc::STDERR_FILENO) };
    if redirect_result == -1 {
        unsafe { libc::close(old_stderr) };
        return Err(anyhow!("Failed to redirect stderr"));
    }

    // Execute the closure
    let result = f();

    // Restore the original stderr
    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

/// On non-Linux platforms, no stderr suppression is needed since ALSA doesn't exist.
#[cfg(not(target_os = "linux"))]
fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    f()
}
