//! # wandersafe-settings
//!
//! Configuration management with layered sources.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`WanderSafeSettings::default()`]
//! 2. **Settings file**: `~/.wandersafe/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `WANDERSAFE_*` overrides (highest priority)
//!
//! Command-line flags are applied on top by the binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_from, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = WanderSafeSettings::default();
        let _path = settings_path();
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = WanderSafeSettings::default();
        assert_eq!(settings.name, "wandersafe");
        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.server.heartbeat_interval_secs, 30);
        assert_eq!(settings.server.heartbeat_timeout_secs, 90);
        assert_eq!(settings.server.cors_origins, vec!["http://localhost:3000".to_string()]);
        assert!(!settings.proximity.validate_ranges);
        assert!(settings.validate().is_ok());
    }
}
