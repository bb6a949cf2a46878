//! Errors raised while assembling [`PanelSettings`](crate::PanelSettings).

use thiserror::Error;

/// Why the layered settings could not be produced.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read panel settings: {0}")]
    Io(#[from] std::io::Error),
    /// The settings file is not valid JSON or has the wrong shape.
    #[error("malformed panel settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A key holds a value the server cannot start with.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Dotted camelCase path of the offending key, e.g. `server.port`.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl SettingsError {
    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key,
            reason: reason.into(),
        }
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
