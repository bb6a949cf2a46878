//! # ctlpanel-settings
//!
//! Configuration with layered sources.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`PanelSettings::default()`]
//! 2. **User file**: `~/.ctlpanel/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `CTLPANEL_*` overrides (highest priority)
//!
//! Command-line flags of the binaries are applied on top by the caller.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = PanelSettings::default();
        let _path = settings_path();
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = PanelSettings::default();
        assert_eq!(settings.server.host, "localhost");
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.max_sessions, 2);
        assert!(settings.server.health_enabled);
        assert_eq!(settings.server.health_port, 9001);
        assert_eq!(settings.audio.backend, AudioBackend::Null);
        assert_eq!(settings.logging.level, "info");
        assert!(settings.validate().is_ok());
    }
}
