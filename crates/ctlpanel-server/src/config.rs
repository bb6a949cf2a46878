//! Server configuration.

use ctlpanel_settings::ServerSettings;
use serde::{Deserialize, Serialize};

/// Runtime configuration of a [`crate::server::PanelServer`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"localhost"`).
    pub host: String,
    /// WebSocket port (`0` picks a free port).
    pub port: u16,
    /// Number of session slots.
    pub max_sessions: usize,
    /// Health endpoint port; `None` disables the endpoint.
    pub health_port: Option<u16>,
}

impl ServerConfig {
    /// Build from the `server` section of the settings.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            max_sessions: settings.max_sessions,
            health_port: settings.health_enabled.then_some(settings.health_port),
        }
    }

    /// Loopback, ephemeral ports, no health endpoint.
    pub fn ephemeral(max_sessions: usize) -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_sessions,
            health_port: None,
        }
    }

    /// `host:port` of the WebSocket listener.
    pub fn ws_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `host:port` of the health endpoint, if enabled.
    pub fn health_addr(&self) -> Option<String> {
        self.health_port.map(|port| format!("{}:{port}", self.host))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_settings(&ServerSettings::default())
    }
}
