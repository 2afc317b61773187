//! Wall-clock source for scheduling decisions

use chrono::{DateTime, Local};
use std::sync::Mutex;
use std::time::Duration;

/// Source of the current local time
///
/// Every window check and timer deadline goes through a `Clock` so tests can
/// drive the scheduler through a day without waiting for one.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// The real clock (honors `PRESENCE_MOCK_TIME` in debug builds)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        presence_util::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        if let Ok(by) = chrono::Duration::from_std(by) {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
