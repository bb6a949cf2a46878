//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`PanelSettings::default()`]
//! 2. If `~/.ctlpanel/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `CTLPANEL_*` environment variable overrides
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use ctlpanel_core::logging::LogFormat;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{AudioBackend, PanelSettings};

/// Resolve the path to the settings file (`~/.ctlpanel/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".ctlpanel").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<PanelSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON or an invalid final value
/// is an error.
pub fn load_settings_from_path(path: &Path) -> Result<PanelSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Defaults deep-merged with the settings file, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<PanelSettings> {
    let defaults = serde_json::to_value(PanelSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply process environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut PanelSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are logged and ignored (the file/default value is kept).
pub fn apply_overrides_from(settings: &mut PanelSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read("CTLPANEL_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_parsed("CTLPANEL_PORT", read("CTLPANEL_PORT"), |v| {
        parse_u16_range(v, 0, 65535)
    }) {
        settings.server.port = v;
    }
    if let Some(v) = read_parsed("CTLPANEL_MAX_SESSIONS", read("CTLPANEL_MAX_SESSIONS"), |v| {
        parse_usize_range(v, 1, 10_000)
    }) {
        settings.server.max_sessions = v;
    }
    if let Some(v) = read_parsed("CTLPANEL_HEALTH_ENABLED", read("CTLPANEL_HEALTH_ENABLED"), parse_bool) {
        settings.server.health_enabled = v;
    }
    if let Some(v) = read_parsed("CTLPANEL_HEALTH_PORT", read("CTLPANEL_HEALTH_PORT"), |v| {
        parse_u16_range(v, 0, 65535)
    }) {
        settings.server.health_port = v;
    }

    // ── Audio ───────────────────────────────────────────────────────
    if let Some(v) = read_parsed("CTLPANEL_AUDIO_BACKEND", read("CTLPANEL_AUDIO_BACKEND"), |v| {
        serde_json::from_value::<AudioBackend>(Value::String(v.to_lowercase())).ok()
    }) {
        settings.audio.backend = v;
    }
    if let Some(v) = read("CTLPANEL_AUDIO_DEVICE") {
        settings.audio.device = Some(v);
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read("CTLPANEL_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_parsed("CTLPANEL_LOG_FORMAT", read("CTLPANEL_LOG_FORMAT"), |v| {
        serde_json::from_value::<LogFormat>(Value::String(v.to_lowercase())).ok()
    }) {
        settings.logging.format = v;
    }
}

fn read_parsed<T>(
    name: &str,
    raw: Option<String>,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = raw?;
    let parsed = parse(&raw);
    if parsed.is_none() {
        warn!(key = name, value = %raw, "invalid env var, ignoring");
    }
    parsed
}

// ── Pure parsing functions ──────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::errors::SettingsError;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 9000, "host": "localhost"}});
        let source = serde_json::json!({"server": {"port": 9100}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9100);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_new_keys_added() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"b": 2}));
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    // ── file layer ──────────────────────────────────────────────────

    #[test]
    fn missing_file_returns_defaults() {
        let settings = load_file_layer(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.max_sessions, 2);
    }

    #[test]
    fn partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"maxSessions": 8}, "logging": {"format": "json"}}"#,
        )
        .unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.server.max_sessions, 8);
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();
        assert!(matches!(
            load_file_layer(&path).unwrap_err(),
            SettingsError::Json(_)
        ));
    }

    #[test]
    fn invalid_value_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"maxSessions": 0}}"#).unwrap();
        assert!(matches!(
            load_settings_from_path(&path).unwrap_err(),
            SettingsError::InvalidValue { key: "server.maxSessions", .. }
        ));
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_overrides_apply() {
        let mut settings = PanelSettings::default();
        apply_overrides_from(
            &mut settings,
            env(&[
                ("CTLPANEL_HOST", "0.0.0.0"),
                ("CTLPANEL_PORT", "9500"),
                ("CTLPANEL_MAX_SESSIONS", "16"),
                ("CTLPANEL_HEALTH_ENABLED", "off"),
                ("CTLPANEL_HEALTH_PORT", "9501"),
                ("CTLPANEL_AUDIO_BACKEND", "CPAL"),
                ("CTLPANEL_AUDIO_DEVICE", "pulse"),
                ("CTLPANEL_LOG_LEVEL", "debug"),
                ("CTLPANEL_LOG_FORMAT", "json"),
            ]),
        );
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9500);
        assert_eq!(settings.server.max_sessions, 16);
        assert!(!settings.server.health_enabled);
        assert_eq!(settings.server.health_port, 9501);
        assert_eq!(settings.audio.backend, AudioBackend::Cpal);
        assert_eq!(settings.audio.device.as_deref(), Some("pulse"));
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn invalid_env_values_ignored() {
        let mut settings = PanelSettings::default();
        apply_overrides_from(
            &mut settings,
            env(&[
                ("CTLPANEL_PORT", "not-a-port"),
                ("CTLPANEL_MAX_SESSIONS", "0"),
                ("CTLPANEL_HEALTH_ENABLED", "maybe"),
                ("CTLPANEL_AUDIO_BACKEND", "alsa"),
                ("CTLPANEL_HOST", ""),
            ]),
        );
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.max_sessions, 2);
        assert!(settings.server.health_enabled);
        assert_eq!(settings.audio.backend, AudioBackend::Null);
        assert_eq!(settings.server.host, "localhost");
    }

    #[test]
    fn no_env_keeps_file_values() {
        let mut settings = PanelSettings::default();
        settings.server.port = 1234;
        apply_overrides_from(&mut settings, |_| None);
        assert_eq!(settings.server.port, 1234);
    }

    // ── parsers ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for val in ["true", "1", "yes", "on", "TRUE", "On"] {
            assert_eq!(parse_bool(val), Some(true), "{val}");
        }
        for val in ["false", "0", "no", "off", "NO"] {
            assert_eq!(parse_bool(val), Some(false), "{val}");
        }
        assert_eq!(parse_bool("2"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("80", 1, 65535), Some(80));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("70000", 0, 65535), None);
        assert_eq!(parse_usize_range("3", 1, 10), Some(3));
        assert_eq!(parse_usize_range("11", 1, 10), None);
        assert_eq!(parse_usize_range("-1", 1, 10), None);
    }
}
