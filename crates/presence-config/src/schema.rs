//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};

/// Raw configuration as parsed from TOML
///
/// Every value is optional at this layer so that the file, the environment
/// and the command line can each supply part of it. Validation decides what
/// is actually required.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Channel the daemon occupies
    #[serde(default)]
    pub target: RawTarget,

    /// Daily active window
    #[serde(default)]
    pub active_hours: RawActiveHours,

    /// Session duration and inter-session delay bounds
    #[serde(default)]
    pub session: RawSession,

    /// Daemon-level settings
    #[serde(default)]
    pub daemon: RawDaemonConfig,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            config_version: crate::CURRENT_CONFIG_VERSION,
            target: RawTarget::default(),
            active_hours: RawActiveHours::default(),
            session: RawSession::default(),
            daemon: RawDaemonConfig::default(),
        }
    }
}

/// Target guild and voice channel
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTarget {
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
}

/// Active window, in whole hours of the local day
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawActiveHours {
    /// First hour sessions may run (default 16)
    pub start: Option<u32>,

    /// Hour at which the daily reset fires (default 23)
    pub end: Option<u32>,
}

/// Session timing, in minutes
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSession {
    pub duration_min_minutes: Option<u32>,
    pub duration_max_minutes: Option<u32>,
    pub delay_min_minutes: Option<u32>,
    pub delay_max_minutes: Option<u32>,
}

/// Daemon-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDaemonConfig {
    /// How long to wait for the voice connection to become ready (default 30)
    pub connect_timeout_seconds: Option<u64>,

    /// How long to wait for a disconnect before giving up on it (default 10)
    pub disconnect_timeout_seconds: Option<u64>,
}

/// Values supplied outside the config file (environment, command line).
///
/// Any field that is `Some` replaces the corresponding file value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    pub active_hour_start: Option<u32>,
    pub active_hour_end: Option<u32>,
    pub duration_min_minutes: Option<u32>,
    pub duration_max_minutes: Option<u32>,
    pub delay_min_minutes: Option<u32>,
    pub delay_max_minutes: Option<u32>,
}

impl RawConfig {
    /// Layer overrides on top of the parsed file
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        fn set<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if let Some(v) = value {
                *slot = Some(v.clone());
            }
        }

        set(&mut self.target.guild_id, &overrides.guild_id);
        set(&mut self.target.channel_id, &overrides.channel_id);
        set(&mut self.active_hours.start, &overrides.active_hour_start);
        set(&mut self.active_hours.end, &overrides.active_hour_end);
        set(&mut self.session.duration_min_minutes, &overrides.duration_min_minutes);
        set(&mut self.session.duration_max_minutes, &overrides.duration_max_minutes);
        set(&mut self.session.delay_min_minutes, &overrides.delay_min_minutes);
        set(&mut self.session.delay_max_minutes, &overrides.delay_max_minutes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
            config_version = 1

            [target]
            guild_id = "111"
            channel_id = "222"

            [active_hours]
            start = 16
            end = 23

            [session]
            duration_min_minutes = 34
            duration_max_minutes = 72
            delay_min_minutes = 75
            delay_max_minutes = 105

            [daemon]
            connect_timeout_seconds = 30
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.target.channel_id.as_deref(), Some("222"));
        assert_eq!(config.active_hours.end, Some(23));
        assert_eq!(config.session.delay_max_minutes, Some(105));
        assert_eq!(config.daemon.connect_timeout_seconds, Some(30));
        assert_eq!(config.daemon.disconnect_timeout_seconds, None);
    }

    #[test]
    fn sections_are_optional() {
        let config: RawConfig = toml::from_str("config_version = 1").unwrap();
        assert!(config.target.guild_id.is_none());
        assert!(config.active_hours.start.is_none());
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config: RawConfig = toml::from_str(
            r#"
            config_version = 1
            [target]
            guild_id = "from-file"
            channel_id = "from-file"
            [active_hours]
            start = 10
            "#,
        )
        .unwrap();

        config.apply_overrides(&ConfigOverrides {
            channel_id: Some("from-env".into()),
            active_hour_end: Some(12),
            ..Default::default()
        });

        assert_eq!(config.target.guild_id.as_deref(), Some("from-file"));
        assert_eq!(config.target.channel_id.as_deref(), Some("from-env"));
        assert_eq!(config.active_hours.start, Some(10));
        assert_eq!(config.active_hours.end, Some(12));
    }
}
