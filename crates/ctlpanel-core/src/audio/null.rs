//! Silent audio device.

use std::time::Duration;

use tracing::debug;

use super::{AudioDevice, AudioError, PcmClip};

/// A device with no hardware behind it.
///
/// In realtime mode `play` and `record` block for the real duration of the
/// audio, so callers observe the same timing as with a sound card.
#[derive(Debug, Clone)]
pub struct NullAudioDevice {
    realtime: bool,
}

impl NullAudioDevice {
    /// Silent device that keeps realtime pacing.
    pub fn new() -> Self {
        Self { realtime: true }
    }

    /// Silent device that returns immediately.
    pub fn instant() -> Self {
        Self { realtime: false }
    }

    fn pace(&self, duration: Duration) {
        if self.realtime && !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

impl Default for NullAudioDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDevice for NullAudioDevice {
    fn name(&self) -> &str {
        "null"
    }

    fn play(&self, clip: &PcmClip) -> Result<(), AudioError> {
        debug!(
            bytes = clip.bytes().len(),
            sample_rate = clip.sample_rate(),
            duration_ms = clip.duration().as_millis(),
            "discarding clip"
        );
        self.pace(clip.duration());
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn record(
        &self,
        frames: usize,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Vec<i16>, AudioError> {
        let len = frames
            .checked_mul(usize::from(channels))
            .ok_or_else(|| AudioError::Config(format!("{frames} frames is too long to record")))?;
        if sample_rate > 0 {
            let secs = frames as f64 / f64::from(sample_rate);
            let length = Duration::try_from_secs_f64(secs)
                .map_err(|e| AudioError::Config(format!("recording length {secs}s: {e}")))?;
            self.pace(length);
        }
        Ok(vec![0; len])
    }
}
