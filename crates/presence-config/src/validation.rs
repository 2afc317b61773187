//! Configuration validation

use crate::schema::RawConfig;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required setting: {0}")]
    MissingField(&'static str),

    #[error("Invalid hour {value} for {field}: must be 0-23")]
    InvalidHour { field: &'static str, value: u32 },

    #[error("Active window {start}:00-{end}:00 crosses midnight, which is not supported")]
    WindowCrossesMidnight { start: u32, end: u32 },

    #[error("{field} must be a positive number")]
    NotPositive { field: &'static str },

    #[error("{name}: minimum {min} is greater than maximum {max}")]
    InvertedRange { name: &'static str, min: u32, max: u32 },
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_target(config));
    errors.extend(validate_active_hours(config));

    let session = &config.session;
    errors.extend(validate_range(
        "session duration",
        ("session.duration_min_minutes", session.duration_min_minutes),
        ("session.duration_max_minutes", session.duration_max_minutes),
        (crate::DEFAULT_DURATION_MIN_MINUTES, crate::DEFAULT_DURATION_MAX_MINUTES),
    ));
    errors.extend(validate_range(
        "session delay",
        ("session.delay_min_minutes", session.delay_min_minutes),
        ("session.delay_max_minutes", session.delay_max_minutes),
        (crate::DEFAULT_DELAY_MIN_MINUTES, crate::DEFAULT_DELAY_MAX_MINUTES),
    ));

    if config.daemon.connect_timeout_seconds == Some(0) {
        errors.push(ValidationError::NotPositive {
            field: "daemon.connect_timeout_seconds",
        });
    }
    if config.daemon.disconnect_timeout_seconds == Some(0) {
        errors.push(ValidationError::NotPositive {
            field: "daemon.disconnect_timeout_seconds",
        });
    }

    errors
}

fn validate_target(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());

    if blank(&config.target.guild_id) {
        errors.push(ValidationError::MissingField("target.guild_id"));
    }
    if blank(&config.target.channel_id) {
        errors.push(ValidationError::MissingField("target.channel_id"));
    }

    errors
}

fn validate_active_hours(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let start = config.active_hours.start.unwrap_or(crate::DEFAULT_ACTIVE_HOUR_START);
    let end = config.active_hours.end.unwrap_or(crate::DEFAULT_ACTIVE_HOUR_END);

    if start > 23 {
        errors.push(ValidationError::InvalidHour {
            field: "active_hours.start",
            value: start,
        });
    }
    if end > 23 {
        errors.push(ValidationError::InvalidHour {
            field: "active_hours.end",
            value: end,
        });
    }

    // start == end is a valid, always-inactive window
    if errors.is_empty() && start > end {
        errors.push(ValidationError::WindowCrossesMidnight { start, end });
    }

    errors
}

fn validate_range(
    name: &'static str,
    (min_field, min): (&'static str, Option<u32>),
    (max_field, max): (&'static str, Option<u32>),
    (default_min, default_max): (u32, u32),
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if min == Some(0) {
        errors.push(ValidationError::NotPositive { field: min_field });
    }
    if max == Some(0) {
        errors.push(ValidationError::NotPositive { field: max_field });
    }

    let min = min.unwrap_or(default_min);
    let max = max.unwrap_or(default_max);
    if min > max {
        errors.push(ValidationError::InvertedRange { name, min, max });
    }

    errors
}
