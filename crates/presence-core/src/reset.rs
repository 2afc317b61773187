//! Daily reset at the end of the active window

use chrono::{DateTime, Local};
use presence_util::ActiveWindow;

/// A reset that fires a little early (timer skew against the wall clock)
/// must not schedule its successor for a few moments later.
const MIN_RESET_SPACING_HOURS: i64 = 1;

/// What the scheduler arms after a reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetPlan {
    /// First session attempt of the next window
    pub next_start: DateTime<Local>,
    /// Following reset
    pub next_reset: DateTime<Local>,
}

/// Computes the hard daily boundary
///
/// The reset fires at `end_hour:00` every day. After firing, the next session
/// attempt is anchored to the next `start_hour:00` rather than to a random
/// delay, so no session can straddle the window edge.
#[derive(Debug, Clone, Copy)]
pub struct DailyResetController {
    window: ActiveWindow,
}

impl DailyResetController {
    pub fn new(window: ActiveWindow) -> Self {
        Self { window }
    }

    /// Next time the reset should fire, strictly after `now`
    pub fn next_fire(&self, now: &DateTime<Local>) -> DateTime<Local> {
        self.window.next_end_after(now)
    }

    /// Plan for a reset firing at `now`
    pub fn plan(&self, now: &DateTime<Local>) -> ResetPlan {
        let mut next_reset = self.window.next_end_after(now);
        if next_reset - *now < chrono::Duration::hours(MIN_RESET_SPACING_HOURS) {
            next_reset = self.window.next_end_after(&next_reset);
        }

        ResetPlan {
            next_start: self.window.next_start_after(now),
            next_reset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, day, h, m, 0).unwrap()
    }

    #[test]
    fn fires_at_window_end() {
        let reset = DailyResetController::new(ActiveWindow::new(16, 23).unwrap());
        assert_eq!(reset.next_fire(&at(2, 16, 5)), at(2, 23, 0));
        assert_eq!(reset.next_fire(&at(2, 23, 0)), at(3, 23, 0));
        assert_eq!(reset.next_fire(&at(2, 23, 30)), at(3, 23, 0));
    }

    #[test]
    fn plan_anchors_to_tomorrow() {
        let reset = DailyResetController::new(ActiveWindow::new(16, 23).unwrap());
        let plan = reset.plan(&at(2, 23, 0));
        assert_eq!(plan.next_start, at(3, 16, 0));
        assert_eq!(plan.next_reset, at(3, 23, 0));
    }

    #[test]
    fn early_firing_skips_to_following_day() {
        let reset = DailyResetController::new(ActiveWindow::new(16, 23).unwrap());
        let early = Local.with_ymd_and_hms(2025, 6, 2, 22, 59, 59).unwrap();
        assert_eq!(reset.plan(&early).next_reset, at(3, 23, 0));
    }
}
