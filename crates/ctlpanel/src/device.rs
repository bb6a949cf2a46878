//! Audio device selection from settings.

use std::sync::Arc;

use anyhow::Result;
use ctlpanel_core::{AudioDevice, NullAudioDevice};
use ctlpanel_settings::{AudioBackend, AudioSettings};
use tracing::info;

/// Build the device named by `settings.backend`.
///
/// `cpal` fails unless the crate was built with the `device-cpal` feature.
pub fn build_audio_device(settings: &AudioSettings) -> Result<Arc<dyn AudioDevice>> {
    let device: Arc<dyn AudioDevice> = match settings.backend {
        AudioBackend::Null => Arc::new(NullAudioDevice::new()),
        AudioBackend::Cpal => cpal_device(settings)?,
    };
    info!(backend = ?settings.backend, device = device.name(), "audio device ready");
    Ok(device)
}

#[cfg(feature = "device-cpal")]
fn cpal_device(settings: &AudioSettings) -> Result<Arc<dyn AudioDevice>> {
    Ok(Arc::new(ctlpanel_core::audio::CpalAudioDevice::new(
        settings.device.clone(),
    )))
}

#[cfg(not(feature = "device-cpal"))]
fn cpal_device(_settings: &AudioSettings) -> Result<Arc<dyn AudioDevice>> {
    anyhow::bail!("audio backend \"cpal\" requires the device-cpal feature")
}
