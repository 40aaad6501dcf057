//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`WanderSafeSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `WANDERSAFE_*` environment overrides (highest priority)
//! 4. Validate cross-field constraints
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::WanderSafeSettings;

/// Resolve the default settings file path (`~/.wandersafe/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".wandersafe").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<WanderSafeSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or a failed validation is
/// an error.
pub fn load_settings_from_path(path: &Path) -> Result<WanderSafeSettings> {
    let defaults = serde_json::to_value(WanderSafeSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: WanderSafeSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
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

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning and the file/default value
/// stays in effect.
pub fn apply_env_overrides(settings: &mut WanderSafeSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary key lookup (testable without env vars).
pub fn apply_overrides_from(
    settings: &mut WanderSafeSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read("WANDERSAFE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = parsed(&read, "WANDERSAFE_PORT", |s| parse_range::<u16>(s, 0, 65535)) {
        settings.server.port = v;
    }
    if let Some(v) = parsed(&read, "WANDERSAFE_HEARTBEAT_INTERVAL_SECS", |s| {
        parse_range::<u64>(s, 1, 3600)
    }) {
        settings.server.heartbeat_interval_secs = v;
    }
    if let Some(v) = parsed(&read, "WANDERSAFE_HEARTBEAT_TIMEOUT_SECS", |s| {
        parse_range::<u64>(s, 1, 86_400)
    }) {
        settings.server.heartbeat_timeout_secs = v;
    }
    if let Some(v) = read("WANDERSAFE_CORS_ORIGINS") {
        settings.server.cors_origins = parse_list(&v);
    }

    // ── Proximity ───────────────────────────────────────────────────
    if let Some(v) = parsed(&read, "WANDERSAFE_IDENTITY_BINDING", |s| s.parse().ok()) {
        settings.proximity.identity_binding = v;
    }
    if let Some(v) = parsed(&read, "WANDERSAFE_STRATEGY", |s| s.parse().ok()) {
        settings.proximity.strategy = v;
    }
    if let Some(v) = parsed(&read, "WANDERSAFE_VALIDATE_RANGES", parse_bool) {
        settings.proximity.validate_ranges = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read("WANDERSAFE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = parsed(&read, "WANDERSAFE_LOG_FORMAT", |s| s.parse().ok()) {
        settings.logging.format = v;
    }
}

fn parsed<T>(
    read: &impl Fn(&str) -> Option<String>,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let val = read(name)?;
    let result = parse(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid env var, ignoring");
    }
    result
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

/// Parse an integer within an inclusive range.
pub fn parse_range<T: FromStr + PartialOrd>(val: &str, min: T, max: T) -> Option<T> {
    let n: T = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Split a comma-separated list, trimming blanks.
pub fn parse_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
