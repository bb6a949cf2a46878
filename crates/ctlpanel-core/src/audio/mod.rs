//! Audio device abstraction.
//!
//! Devices are blocking: [`AudioDevice::play`] returns when the clip has
//! finished, [`AudioDevice::record`] when the requested frames are captured.
//! Async callers run them on a blocking thread.

use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

use crate::protocol::{CHANNELS, SAMPLE_RATE_HZ};

#[cfg(feature = "device-cpal")]
mod cpal_device;
mod null;

#[cfg(feature = "device-cpal")]
pub use cpal_device::CpalAudioDevice;
pub use null::NullAudioDevice;

/// Errors raised by audio devices.
#[derive(Debug, Error)]
pub enum AudioError {
    /// No device is available for the requested direction.
    #[error("no {direction} audio device available")]
    NoDevice {
        /// `"input"` or `"output"`.
        direction: &'static str,
    },
    /// The device refused the stream configuration.
    #[error("audio stream configuration failed: {0}")]
    Config(String),
    /// The stream failed while running.
    #[error("audio stream failed: {0}")]
    Stream(String),
}

/// A blocking audio device.
pub trait AudioDevice: Send + Sync {
    /// Human-readable device name for logs.
    fn name(&self) -> &str;

    /// Play `clip`, blocking until playback completes.
    fn play(&self, clip: &PcmClip) -> Result<(), AudioError>;

    /// Record `frames` frames, blocking until they are captured.
    ///
    /// Returns interleaved samples (`frames * channels` values).
    fn record(&self, frames: usize, sample_rate: u32, channels: u16)
    -> Result<Vec<i16>, AudioError>;
}

/// Raw little-endian signed 16-bit PCM with its format.
///
/// The byte buffer is kept exactly as received; a trailing odd byte is
/// ignored when decoding samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmClip {
    bytes: Bytes,
    sample_rate: u32,
    channels: u16,
}

impl PcmClip {
    /// Wrap `bytes` with an explicit format.
    pub fn new(bytes: Bytes, sample_rate: u32, channels: u16) -> Self {
        Self {
            bytes,
            sample_rate,
            channels,
        }
    }

    /// Wrap a binary frame from the wire (44.1 kHz mono).
    pub fn from_wire(bytes: Bytes) -> Self {
        Self::new(bytes, SAMPLE_RATE_HZ, CHANNELS)
    }

    /// Encode interleaved samples as little-endian bytes.
    pub fn from_samples(samples: &[i16], sample_rate: u32, channels: u16) -> Self {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::new(Bytes::from(bytes), sample_rate, channels)
    }

    /// The raw buffer.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Interleaved channel count.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Decode the buffer into samples.
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
    }

    /// Number of whole frames in the buffer.
    pub fn frame_count(&self) -> usize {
        self.bytes.len() / 2 / usize::from(self.channels.max(1))
    }

    /// Playback length at the clip's sample rate.
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / f64::from(self.sample_rate))
    }
}
