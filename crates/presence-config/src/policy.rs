//! Validated policy structures

use crate::schema::RawConfig;
use crate::ValidationError;
use presence_util::{ActiveWindow, ChannelId, GuildId};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Validated policy, immutable for the lifetime of the daemon
#[derive(Debug, Clone)]
pub struct Policy {
    /// Channel to occupy
    pub target: Target,

    /// Hours during which sessions may run
    pub window: ActiveWindow,

    /// Duration and delay bounds
    pub session: SessionConfig,

    /// Daemon configuration
    pub daemon: DaemonConfig,
}

impl Policy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Result<Self, ValidationError> {
        let guild_id = raw
            .target
            .guild_id
            .ok_or(ValidationError::MissingField("target.guild_id"))?;
        let channel_id = raw
            .target
            .channel_id
            .ok_or(ValidationError::MissingField("target.channel_id"))?;

        let start = raw.active_hours.start.unwrap_or(crate::DEFAULT_ACTIVE_HOUR_START);
        let end = raw.active_hours.end.unwrap_or(crate::DEFAULT_ACTIVE_HOUR_END);
        let (start_hour, end_hour) = (
            hour(start, "active_hours.start")?,
            hour(end, "active_hours.end")?,
        );
        if start_hour > end_hour {
            return Err(ValidationError::WindowCrossesMidnight { start, end });
        }
        let window = ActiveWindow::new(start_hour, end_hour).ok_or(ValidationError::InvalidHour {
            field: "active_hours",
            value: end,
        })?;

        let session = SessionConfig {
            duration_min: raw
                .session
                .duration_min_minutes
                .unwrap_or(crate::DEFAULT_DURATION_MIN_MINUTES),
            duration_max: raw
                .session
                .duration_max_minutes
                .unwrap_or(crate::DEFAULT_DURATION_MAX_MINUTES),
            delay_min: raw
                .session
                .delay_min_minutes
                .unwrap_or(crate::DEFAULT_DELAY_MIN_MINUTES),
            delay_max: raw
                .session
                .delay_max_minutes
                .unwrap_or(crate::DEFAULT_DELAY_MAX_MINUTES),
        };

        Ok(Self {
            target: Target {
                guild_id: GuildId::new(guild_id.trim()),
                channel_id: ChannelId::new(channel_id.trim()),
            },
            window,
            session,
            daemon: DaemonConfig::from_raw(raw.daemon),
        })
    }
}

fn hour(value: u32, field: &'static str) -> Result<u8, ValidationError> {
    u8::try_from(value)
        .ok()
        .filter(|h| *h < 24)
        .ok_or(ValidationError::InvalidHour { field, value })
}

/// The guild and voice channel the daemon occupies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
}

/// Session timing bounds, in whole minutes, `min <= max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub duration_min: u32,
    pub duration_max: u32,
    pub delay_min: u32,
    pub delay_max: u32,
}

impl SessionConfig {
    pub fn duration_range(&self) -> RangeInclusive<u32> {
        self.duration_min..=self.duration_max
    }

    pub fn delay_range(&self) -> RangeInclusive<u32> {
        self.delay_min..=self.delay_max
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_min: crate::DEFAULT_DURATION_MIN_MINUTES,
            duration_max: crate::DEFAULT_DURATION_MAX_MINUTES,
            delay_min: crate::DEFAULT_DELAY_MIN_MINUTES,
            delay_max: crate::DEFAULT_DELAY_MAX_MINUTES,
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Upper bound on a single connect attempt
    pub connect_timeout: Duration,

    /// Upper bound on releasing a connection
    pub disconnect_timeout: Duration,
}

impl DaemonConfig {
    fn from_raw(raw: crate::schema::RawDaemonConfig) -> Self {
        let defaults = Self::default();
        Self {
            connect_timeout: raw
                .connect_timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            disconnect_timeout: raw
                .disconnect_timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.disconnect_timeout),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            disconnect_timeout: Duration::from_secs(10),
        }
    }
}
