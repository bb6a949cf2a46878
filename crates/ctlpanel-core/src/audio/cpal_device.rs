//! CPAL-backed audio device.
//!
//! CPAL streams are not `Send`, so every call builds its own stream on the
//! calling thread, waits for the callback to signal completion, and drops
//! the stream before returning.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{AudioDevice, AudioError, PcmClip};

/// Extra time allowed past the nominal clip length before giving up.
const COMPLETION_GRACE: Duration = Duration::from_secs(2);

/// Hardware device on the default CPAL host.
#[derive(Debug, Clone, Default)]
pub struct CpalAudioDevice {
    /// Output/input device name; `None` selects the host defaults.
    device_name: Option<String>,
}

impl CpalAudioDevice {
    /// Use the named device, or the host defaults when `None`.
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }

    fn output_device(&self) -> Result<cpal::Device, AudioError> {
        let host = cpal::default_host();
        let device = match &self.device_name {
            Some(name) => host
                .output_devices()
                .map_err(|e| AudioError::Config(e.to_string()))?
                .find(|d| d.name().is_ok_and(|n| &n == name)),
            None => host.default_output_device(),
        };
        device.ok_or(AudioError::NoDevice {
            direction: "output",
        })
    }

    fn input_device(&self) -> Result<cpal::Device, AudioError> {
        let host = cpal::default_host();
        let device = match &self.device_name {
            Some(name) => host
                .input_devices()
                .map_err(|e| AudioError::Config(e.to_string()))?
                .find(|d| d.name().is_ok_and(|n| &n == name)),
            None => host.default_input_device(),
        };
        device.ok_or(AudioError::NoDevice { direction: "input" })
    }
}

fn stream_config(sample_rate: u32, channels: u16) -> cpal::StreamConfig {
    cpal::StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    }
}

fn wait_for(
    done_rx: &mpsc::Receiver<Result<(), String>>,
    nominal: Duration,
) -> Result<(), AudioError> {
    match done_rx.recv_timeout(nominal + COMPLETION_GRACE) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(message)) => Err(AudioError::Stream(message)),
        Err(_) => Err(AudioError::Stream("stream did not complete in time".into())),
    }
}

/// Copy the samples at `start..` into `out`, padding with silence.
///
/// Returns true once a whole buffer lies past the end of `source`: the
/// buffer holding the last samples has then been handed to the hardware.
fn fill_output(out: &mut [f32], source: &[f32], start: usize) -> bool {
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = source.get(start + i).copied().unwrap_or(0.0);
    }
    start >= source.len()
}

impl AudioDevice for CpalAudioDevice {
    fn name(&self) -> &str {
        self.device_name.as_deref().unwrap_or("default")
    }

    fn play(&self, clip: &PcmClip) -> Result<(), AudioError> {
        let samples: Arc<Vec<f32>> = Arc::new(
            clip.samples()
                .map(|s| f32::from(s) / f32::from(i16::MAX))
                .collect(),
        );
        if samples.is_empty() {
            return Ok(());
        }

        let device = self.output_device()?;
        let config = stream_config(clip.sample_rate(), clip.channels());
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        let err_tx = done_tx.clone();
        let position = AtomicUsize::new(0);
        let source = samples.clone();

        let stream = device
            .build_output_stream(
                &config,
                move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let start = position.fetch_add(out.len(), Ordering::Relaxed);
                    if fill_output(out, &source, start) {
                        let _ = done_tx.try_send(Ok(()));
                    }
                },
                move |err| {
                    let _ = err_tx.try_send(Err(err.to_string()));
                },
                None,
            )
            .map_err(|e| AudioError::Config(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::Stream(e.to_string()))?;
        debug!(device = self.name(), samples = samples.len(), "playback started");

        let outcome = wait_for(&done_rx, clip.duration());
        drop(stream);
        if let Err(ref e) = outcome {
            warn!(device = self.name(), error = %e, "playback failed");
        }
        outcome
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn record(
        &self,
        frames: usize,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Vec<i16>, AudioError> {
        let wanted = frames * usize::from(channels);
        if wanted == 0 {
            return Ok(Vec::new());
        }

        let device = self.input_device()?;
        let config = stream_config(sample_rate, channels);
        let captured = Arc::new(Mutex::new(Vec::with_capacity(wanted)));
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        let err_tx = done_tx.clone();
        let sink = captured.clone();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mut buf = sink.lock();
                    let room = wanted.saturating_sub(buf.len());
                    buf.extend(
                        data.iter()
                            .take(room)
                            .map(|s| (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16),
                    );
                    if buf.len() >= wanted {
                        let _ = done_tx.try_send(Ok(()));
                    }
                },
                move |err| {
                    let _ = err_tx.try_send(Err(err.to_string()));
                },
                None,
            )
            .map_err(|e| AudioError::Config(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        let nominal = if sample_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(frames as f64 / f64::from(sample_rate))
        };
        let outcome = wait_for(&done_rx, nominal);
        drop(stream);
        outcome?;

        let samples = std::mem::take(&mut *captured.lock());
        Ok(samples)
    }
}
