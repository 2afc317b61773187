//! Configuration parsing and validation for presenced
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Target guild/channel, active window, session timing
//! - Overrides from the environment or command line
//! - Validation with clear error messages

mod policy;
mod schema;
mod validation;

pub use policy::*;
pub use schema::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

pub const DEFAULT_ACTIVE_HOUR_START: u32 = 16;
pub const DEFAULT_ACTIVE_HOUR_END: u32 = 23;
pub const DEFAULT_DURATION_MIN_MINUTES: u32 = 34;
pub const DEFAULT_DURATION_MAX_MINUTES: u32 = 72;
pub const DEFAULT_DELAY_MIN_MINUTES: u32 = 75;
pub const DEFAULT_DELAY_MAX_MINUTES: u32 = 105;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Policy> {
    load_config_with(path, &ConfigOverrides::default())
}

/// Load a TOML file, layer `overrides` on top, then validate
pub fn load_config_with(
    path: impl AsRef<Path>,
    overrides: &ConfigOverrides,
) -> ConfigResult<Policy> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    tracing::debug!(path = %path.display(), "Read configuration file");

    let mut raw: RawConfig = toml::from_str(&content)?;
    raw.apply_overrides(overrides);
    finalize(raw)
}

/// Build configuration from overrides alone, with defaults for everything
/// they leave unset
pub fn config_from_overrides(overrides: &ConfigOverrides) -> ConfigResult<Policy> {
    let mut raw = RawConfig::default();
    raw.apply_overrides(overrides);
    finalize(raw)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Policy> {
    let raw: RawConfig = toml::from_str(content)?;
    finalize(raw)
}

fn finalize(raw: RawConfig) -> ConfigResult<Policy> {
    // Check version
    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    // Validate
    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Policy::from_raw(raw).map_err(|e| ConfigError::ValidationFailed { errors: vec![e] })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_minimal_config() {
        let config = r#"
            config_version = 1

            [target]
            guild_id = "111"
            channel_id = "222"
        "#;

        let policy = parse_config(config).unwrap();
        assert_eq!(policy.target.guild_id.as_str(), "111");
        assert_eq!(policy.window.start_hour(), 16);
        assert_eq!(policy.window.end_hour(), 23);
    }

    #[test]
    fn reject_wrong_version() {
        let config = r#"
            config_version = 99

            [target]
            guild_id = "111"
            channel_id = "222"
        "#;

        let result = parse_config(config);
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn reject_invalid_values() {
        let config = r#"
            config_version = 1

            [target]
            guild_id = "111"

            [session]
            delay_min_minutes = 120
            delay_max_minutes = 60
        "#;

        match parse_config(config) {
            Err(ConfigError::ValidationFailed { errors }) => {
                assert_eq!(errors.len(), 2);
                assert!(errors.contains(&ValidationError::MissingField("target.channel_id")));
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn load_from_file_with_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            config_version = 1

            [target]
            guild_id = "111"
            channel_id = "222"

            [active_hours]
            start = 9
            end = 17
            "#
        )
        .unwrap();

        let overrides = ConfigOverrides {
            active_hour_end: Some(18),
            duration_max_minutes: Some(50),
            ..Default::default()
        };

        let policy = load_config_with(file.path(), &overrides).unwrap();
        assert_eq!(policy.window.start_hour(), 9);
        assert_eq!(policy.window.end_hour(), 18);
        assert_eq!(policy.session.duration_max, 50);
        assert_eq!(policy.session.duration_min, DEFAULT_DURATION_MIN_MINUTES);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }

    #[test]
    fn overrides_alone_are_enough() {
        let overrides = ConfigOverrides {
            guild_id: Some("111".into()),
            channel_id: Some("222".into()),
            ..Default::default()
        };

        let policy = config_from_overrides(&overrides).unwrap();
        assert_eq!(policy.target.channel_id.as_str(), "222");
    }

    #[test]
    fn overrides_without_target_fail() {
        let result = config_from_overrides(&ConfigOverrides::default());
        assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));
    }
}
