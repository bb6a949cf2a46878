//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render the `/metrics` endpoint. Fails if a
/// recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

// Metric name constants to avoid typos across modules.

/// Transport connections accepted (counter).
pub const CONNECTIONS_TOTAL: &str = "ctlpanel_connections_total";
/// Connections rejected because every slot was taken (counter).
pub const REJECTIONS_TOTAL: &str = "ctlpanel_rejections_total";
/// Occupied session slots (gauge).
pub const SESSIONS_ACTIVE: &str = "ctlpanel_sessions_active";
/// Text messages handled (counter, labels: command, outcome).
pub const COMMANDS_TOTAL: &str = "ctlpanel_commands_total";
/// Binary clips played (counter, labels: outcome).
pub const AUDIO_CLIPS_TOTAL: &str = "ctlpanel_audio_clips_total";
/// Session lifetime in seconds (histogram).
pub const SESSION_DURATION_SECONDS: &str = "ctlpanel_session_duration_seconds";
