//! Wall-clock time for presenced
//!
//! Everything the scheduler decides is anchored to the local wall clock: the
//! daily active window, the daily reset boundary and the first attempt of
//! each day.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `PRESENCE_MOCK_TIME` environment variable can be set
//! to shift the wall clock. Mock time advances at the same rate as real time,
//! which makes it possible to watch a window boundary pass without waiting
//! for the evening.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 22:58:00`)

use chrono::{DateTime, Days, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike};
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Duration;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "PRESENCE_MOCK_TIME";

/// Format accepted by [`MOCK_TIME_ENV_VAR`]
pub const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // Wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            let raw = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
            match parse_mock_time(&raw) {
                Some(mock_dt) => {
                    let offset = mock_dt.signed_duration_since(chrono::Local::now());
                    tracing::info!(
                        mock_time = %raw,
                        offset_secs = offset.num_seconds(),
                        "Mock time enabled"
                    );
                    Some(offset)
                }
                None => {
                    tracing::warn!(
                        mock_time = %raw,
                        expected_format = MOCK_TIME_FORMAT,
                        "Invalid mock time, using the real clock"
                    );
                    None
                }
            }
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

#[cfg_attr(not(debug_assertions), allow(dead_code))]
fn parse_mock_time(raw: &str) -> Option<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(raw, MOCK_TIME_FORMAT).ok()?;
    Local.from_local_datetime(&naive).single()
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// The daily hour range during which sessions may run.
///
/// The range is half-open: a window of `16..23` admits 16:00:00 through
/// 22:59:59. A window whose start equals its end is empty and never active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActiveWindow {
    start_hour: u8,
    end_hour: u8,
}

impl ActiveWindow {
    /// Both hours must be in `0..24`.
    pub fn new(start_hour: u8, end_hour: u8) -> Option<Self> {
        if start_hour < 24 && end_hour < 24 {
            Some(Self {
                start_hour,
                end_hour,
            })
        } else {
            None
        }
    }

    pub fn start_hour(&self) -> u8 {
        self.start_hour
    }

    pub fn end_hour(&self) -> u8 {
        self.end_hour
    }

    pub fn is_zero_width(&self) -> bool {
        self.start_hour == self.end_hour
    }

    /// `start_hour <= now.hour < end_hour`
    pub fn is_active(&self, now: &DateTime<Local>) -> bool {
        let hour = now.hour() as u8;
        self.start_hour <= hour && hour < self.end_hour
    }

    /// Next `start_hour:00` strictly after `now`.
    pub fn next_start_after(&self, now: &DateTime<Local>) -> DateTime<Local> {
        next_hour_boundary_after(self.start_hour, now)
    }

    /// Next `end_hour:00` strictly after `now`.
    pub fn next_end_after(&self, now: &DateTime<Local>) -> DateTime<Local> {
        next_hour_boundary_after(self.end_hour, now)
    }
}

impl std::fmt::Display for ActiveWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:00-{:02}:00", self.start_hour, self.end_hour)
    }
}

/// Local `hour:00` on `date`. A time skipped by a DST jump resolves to the
/// first valid instant after it; a repeated time resolves to its first
/// occurrence.
fn local_at_hour(date: NaiveDate, hour: u8) -> Option<DateTime<Local>> {
    let naive = date.and_hms_opt(hour as u32, 0, 0)?;
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => Local
            .from_local_datetime(&(naive + chrono::Duration::hours(1)))
            .earliest(),
    }
}

fn next_hour_boundary_after(hour: u8, now: &DateTime<Local>) -> DateTime<Local> {
    let today = now.date_naive();
    for offset in 0..=2 {
        let Some(date) = today.checked_add_days(Days::new(offset)) else {
            break;
        };
        if let Some(candidate) = local_at_hour(date, hour)
            && candidate > *now
        {
            return candidate;
        }
    }

    // Unreachable for real calendars; keeps the scheduler moving regardless.
    *now + chrono::Duration::hours(24)
}

/// Time from `now` until `target`, zero if `target` has passed.
pub fn duration_until(now: &DateTime<Local>, target: &DateTime<Local>) -> Duration {
    target
        .signed_duration_since(*now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Helper to format durations in human-readable form
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_window_rejects_out_of_range_hours() {
        assert!(ActiveWindow::new(16, 23).is_some());
        assert!(ActiveWindow::new(0, 0).is_some());
        assert!(ActiveWindow::new(24, 23).is_none());
        assert!(ActiveWindow::new(16, 24).is_none());
    }

    #[test]
    fn test_is_active_is_half_open() {
        let window = ActiveWindow::new(16, 23).unwrap();

        assert!(!window.is_active(&at(10, 15, 59)));
        assert!(window.is_active(&at(10, 16, 0)));
        assert!(window.is_active(&at(10, 22, 59)));
        assert!(!window.is_active(&at(10, 23, 0)));
        assert!(!window.is_active(&at(10, 23, 30)));
    }

    #[test]
    fn test_is_active_matches_hour_formula_for_every_hour() {
        for (start, end) in [(16, 23), (0, 23), (9, 10), (5, 5), (20, 4)] {
            let window = ActiveWindow::new(start, end).unwrap();
            for hour in 0..24u32 {
                let now = at(10, hour, 30);
                let expected = (start as u32) <= hour && hour < (end as u32);
                assert_eq!(
                    window.is_active(&now),
                    expected,
                    "window {} at {:02}:30",
                    window,
                    hour
                );
            }
        }
    }

    #[test]
    fn test_zero_width_window_is_never_active() {
        let window = ActiveWindow::new(12, 12).unwrap();
        assert!(window.is_zero_width());
        for hour in 0..24 {
            assert!(!window.is_active(&at(10, hour, 0)));
        }
    }

    #[test]
    fn test_next_start_later_today() {
        let window = ActiveWindow::new(16, 23).unwrap();
        let next = window.next_start_after(&at(10, 9, 15));
        assert_eq!(next, at(10, 16, 0));
    }

    #[test]
    fn test_next_start_rolls_to_tomorrow() {
        let window = ActiveWindow::new(16, 23).unwrap();

        let next = window.next_start_after(&at(10, 23, 0));
        assert_eq!(next, at(11, 16, 0));

        // Exactly on the boundary is not "after"
        let next = window.next_start_after(&at(10, 16, 0));
        assert_eq!(next, at(11, 16, 0));
    }

    #[test]
    fn test_next_end_after() {
        let window = ActiveWindow::new(16, 23).unwrap();

        assert_eq!(window.next_end_after(&at(10, 16, 5)), at(10, 23, 0));
        assert_eq!(window.next_end_after(&at(10, 23, 30)), at(11, 23, 0));
    }

    #[test]
    fn test_duration_until() {
        let now = at(10, 16, 0);
        assert_eq!(
            duration_until(&now, &at(10, 17, 30)),
            Duration::from_secs(90 * 60)
        );
        assert_eq!(duration_until(&now, &at(10, 15, 0)), Duration::ZERO);
    }

    #[test]
    fn test_window_display() {
        let window = ActiveWindow::new(7, 9).unwrap();
        assert_eq!(window.to_string(), "07:00-09:00");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m 1s");
    }

    #[test]
    fn test_parse_mock_time() {
        let parsed = parse_mock_time("2025-12-25 14:30:00").unwrap();
        assert_eq!(parsed.hour(), 14);
        assert_eq!(parsed.day(), 25);

        for invalid in ["2025-12-25", "14:30:00", "2025-12-25T14:30:00", "", "not a date"] {
            assert!(parse_mock_time(invalid).is_none(), "{:?} should not parse", invalid);
        }
    }

    #[test]
    fn test_now_returns_time() {
        let t = now();
        assert!(t.year() >= 2020);
        assert!(t.year() <= 2100);
    }
}
