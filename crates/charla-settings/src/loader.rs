//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`CharlaSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use charla_core::logging::LogFormat;
use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::CharlaSettings;

/// Resolve the path to the settings file (`~/.charla/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".charla").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<CharlaSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<CharlaSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Defaults merged with the settings file, without env overrides.
fn load_file_layer(path: &Path) -> Result<CharlaSettings> {
    let defaults = serde_json::to_value(CharlaSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
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
pub fn apply_env_overrides(settings: &mut CharlaSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// `PORT` is honoured for compatibility with common hosting platforms;
/// `CHARLA_PORT` wins when both are set. Invalid values are ignored with a
/// warning (falling back to file/default).
pub fn apply_overrides_from<F>(settings: &mut CharlaSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    for name in ["PORT", "CHARLA_PORT"] {
        if let Some(v) = read(name) {
            match parse_in_range::<u16>(&v, 0..=u16::MAX) {
                Some(port) => settings.server.port = port,
                None => warn_invalid(name, &v),
            }
        }
    }
    if let Some(v) = read("CHARLA_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("CHARLA_MAX_CONNECTIONS") {
        match parse_in_range(&v, 1..=1_000_000usize) {
            Some(n) => settings.server.max_connections = n,
            None => warn_invalid("CHARLA_MAX_CONNECTIONS", &v),
        }
    }
    if let Some(v) = read("CHARLA_HEARTBEAT_INTERVAL") {
        match parse_in_range(&v, 1..=3600u64) {
            Some(n) => settings.server.heartbeat_interval_secs = n,
            None => warn_invalid("CHARLA_HEARTBEAT_INTERVAL", &v),
        }
    }
    if let Some(v) = read("CHARLA_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("CHARLA_LOG_FORMAT") {
        match LogFormat::parse(&v) {
            Some(format) => settings.logging.format = format,
            None => warn_invalid("CHARLA_LOG_FORMAT", &v),
        }
    }
}

fn warn_invalid(key: &str, value: &str) {
    tracing::warn!(key, value, "invalid env var, ignoring");
}

/// Parse a trimmed number, accepting it only inside `range`.
pub fn parse_in_range<T>(val: &str, range: RangeInclusive<T>) -> Option<T>
where
    T: FromStr + PartialOrd,
{
    val.trim().parse().ok().filter(|n| range.contains(n))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
