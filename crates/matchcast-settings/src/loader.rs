//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`MatchcastSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `MATCHCAST_*` environment variable overrides (highest priority)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{LogLevel, MatchcastSettings};

/// Resolve the default settings file path (`~/.matchcast/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".matchcast").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<MatchcastSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an unusable value is an
/// error.
pub fn load_settings_from_path(path: &Path) -> Result<MatchcastSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.server.validate()?;
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<MatchcastSettings> {
    if !path.exists() {
        debug!(?path, "settings file not found, using defaults");
        return Ok(MatchcastSettings::default());
    }

    debug!(?path, "loading settings from file");
    let parse_err = |source| SettingsError::Json {
        path: path.to_path_buf(),
        source,
    };
    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let user: Value = serde_json::from_str(&content).map_err(parse_err)?;
    let defaults = serde_json::to_value(MatchcastSettings::default()).map_err(parse_err)?;
    serde_json::from_value(deep_merge(defaults, user)).map_err(parse_err)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
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
pub fn apply_env_overrides(settings: &mut MatchcastSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Out-of-range or unparsable values are ignored with a warning and the
/// file/default value is kept.
pub fn apply_overrides_from(
    settings: &mut MatchcastSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read("MATCHCAST_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("MATCHCAST_PORT") {
        match parse_u16_range(&v, 1, 65_535) {
            Some(n) => settings.server.port = n,
            None => warn_ignored("MATCHCAST_PORT", &v),
        }
    }
    if let Some(v) = read("MATCHCAST_MAX_CONNECTIONS") {
        match parse_usize_range(&v, 1, 1_000_000) {
            Some(n) => settings.server.max_connections = n,
            None => warn_ignored("MATCHCAST_MAX_CONNECTIONS", &v),
        }
    }
    if let Some(v) = read("MATCHCAST_HEARTBEAT_INTERVAL_MS") {
        match parse_u64_range(&v, 100, 600_000) {
            Some(n) => settings.server.heartbeat_interval_ms = n,
            None => warn_ignored("MATCHCAST_HEARTBEAT_INTERVAL_MS", &v),
        }
    }
    if let Some(v) = read("MATCHCAST_MAX_MESSAGE_SIZE") {
        match parse_usize_range(&v, 1024, 64 * 1024 * 1024) {
            Some(n) => settings.server.max_message_size = n,
            None => warn_ignored("MATCHCAST_MAX_MESSAGE_SIZE", &v),
        }
    }
    if let Some(v) = read("MATCHCAST_LOG_LEVEL") {
        match LogLevel::parse(&v) {
            Some(level) => settings.logging.level = level,
            None => warn_ignored("MATCHCAST_LOG_LEVEL", &v),
        }
    }
    if let Some(v) = read("MATCHCAST_LOG_JSON") {
        match parse_bool(&v) {
            Some(b) => settings.logging.json = b,
            None => warn_ignored("MATCHCAST_LOG_JSON", &v),
        }
    }
}

fn warn_ignored(key: &str, value: &str) {
    warn!(key, value, "invalid env var, ignoring");
}

// ── Pure parsing functions ──────────────────────────────────────────────────

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

/// Parse a string as a `u16` within an inclusive range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within an inclusive range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
