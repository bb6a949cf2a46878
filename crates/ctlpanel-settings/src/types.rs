//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a partial
//! JSON file only needs the keys it changes.

use ctlpanel_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9100, "maxSessions": 4 },
///   "audio": { "backend": "cpal" },
///   "logging": { "level": "debug", "format": "json" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PanelSettings {
    /// Listener and health endpoint.
    pub server: ServerSettings,
    /// Audio output.
    pub audio: AudioSettings,
    /// Logging.
    pub logging: LoggingSettings,
}

impl PanelSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_sessions == 0 {
            return Err(SettingsError::invalid(
                "server.maxSessions",
                "must be at least 1",
            ));
        }
        if self.server.host.trim().is_empty() {
            return Err(SettingsError::invalid("server.host", "must not be empty"));
        }
        if self.server.health_enabled
            && self.server.health_port != 0
            && self.server.health_port == self.server.port
        {
            return Err(SettingsError::invalid(
                "server.healthPort",
                format!("must differ from server.port ({})", self.server.port),
            ));
        }
        Ok(())
    }
}

/// Network settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// WebSocket port (`0` picks a free port).
    pub port: u16,
    /// Number of session slots.
    pub max_sessions: usize,
    /// Whether to serve `/health` and `/metrics`.
    pub health_enabled: bool,
    /// Health endpoint port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9000,
            max_sessions: 2,
            health_enabled: true,
            health_port: 9001,
        }
    }
}

/// Which audio device plays inbound clips.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioBackend {
    /// Discard audio, keeping realtime pacing.
    #[default]
    Null,
    /// Sound card via CPAL (requires the `device-cpal` feature).
    Cpal,
}

/// Audio settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioSettings {
    /// Backend selection.
    pub backend: AudioBackend,
    /// Device name; `None` uses the host default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
