//! Named, cancellable timers feeding the scheduler loop

use chrono::{DateTime, Local};
use presence_util::duration_until;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// What a timer is for. At most one timer of each kind is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    SessionEnd,
    NextSession,
    DailyReset,
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerKind::SessionEnd => "session_end",
            TimerKind::NextSession => "next_session",
            TimerKind::DailyReset => "daily_reset",
        };
        f.write_str(name)
    }
}

/// Message posted to the scheduler loop when a timer elapses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub generation: u64,
}

#[derive(Debug)]
struct ArmedTimer {
    generation: u64,
    deadline: DateTime<Local>,
    task: JoinHandle<()>,
}

/// Keyed timer table
///
/// Each armed timer is a tokio task sleeping until its deadline. Arming a
/// kind aborts the previous task of that kind, and every firing carries a
/// generation number so a message that was already in flight when its
/// timer got replaced is recognized as stale by [`TimerService::accept`].
#[derive(Debug)]
pub struct TimerService {
    tx: mpsc::UnboundedSender<TimerFired>,
    armed: HashMap<TimerKind, ArmedTimer>,
    next_generation: u64,
}

impl TimerService {
    /// Create a service and the receiver its firings arrive on
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let service = Self {
            tx,
            armed: HashMap::new(),
            next_generation: 1,
        };
        (service, rx)
    }

    /// Arm `kind` to fire at `deadline`, replacing any timer of that kind.
    /// Must be called from within a tokio runtime.
    pub fn arm(
        &mut self,
        kind: TimerKind,
        now: &DateTime<Local>,
        deadline: DateTime<Local>,
    ) -> u64 {
        self.cancel(kind);

        let generation = self.next_generation;
        self.next_generation += 1;

        let delay = duration_until(now, &deadline);
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(TimerFired { kind, generation });
        });

        trace!(%kind, generation, %deadline, "Timer armed");

        self.armed.insert(
            kind,
            ArmedTimer {
                generation,
                deadline,
                task,
            },
        );

        generation
    }

    /// Cancel `kind`. Returns whether a timer was outstanding.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        match self.armed.remove(&kind) {
            Some(timer) => {
                timer.task.abort();
                trace!(%kind, generation = timer.generation, "Timer cancelled");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, timer) in self.armed.drain() {
            timer.task.abort();
        }
    }

    /// Consume a firing. Returns false for firings of cancelled or replaced
    /// timers, which must be ignored.
    pub fn accept(&mut self, fired: TimerFired) -> bool {
        match self.armed.get(&fired.kind) {
            Some(timer) if timer.generation == fired.generation => {
                self.armed.remove(&fired.kind);
                true
            }
            _ => {
                trace!(
                    kind = %fired.kind,
                    generation = fired.generation,
                    "Stale timer firing ignored"
                );
                false
            }
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed.contains_key(&kind)
    }

    /// Deadline of the outstanding timer of `kind`, if any
    pub fn deadline(&self, kind: TimerKind) -> Option<DateTime<Local>> {
        self.armed.get(&kind).map(|t| t.deadline)
    }

    /// Number of outstanding timers
    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 2, h, m, 0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_deadline() {
        let (mut timers, mut rx) = TimerService::channel();
        let generation = timers.arm(TimerKind::NextSession, &at(16, 0), at(16, 5));

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert!(rx.try_recv().is_err());

        let fired = rx.recv().await.unwrap();
        assert_eq!(
            fired,
            TimerFired {
                kind: TimerKind::NextSession,
                generation
            }
        );
        assert!(timers.accept(fired));
        assert!(!timers.is_armed(TimerKind::NextSession));
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_previous_timer() {
        let (mut timers, mut rx) = TimerService::channel();
        timers.arm(TimerKind::SessionEnd, &at(16, 0), at(16, 1));
        let second = timers.arm(TimerKind::SessionEnd, &at(16, 0), at(16, 2));
        assert_eq!(timers.armed_count(), 1);
        assert_eq!(timers.deadline(TimerKind::SessionEnd), Some(at(16, 2)));

        // Only the replacement fires
        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.generation, second);
        assert!(timers.accept(fired));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_firing_is_rejected() {
        let (mut timers, _rx) = TimerService::channel();
        let old = timers.arm(TimerKind::DailyReset, &at(16, 0), at(23, 0));
        timers.arm(TimerKind::DailyReset, &at(16, 0), at(23, 0));

        assert!(!timers.accept(TimerFired {
            kind: TimerKind::DailyReset,
            generation: old,
        }));
        assert!(timers.is_armed(TimerKind::DailyReset));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let (mut timers, mut rx) = TimerService::channel();
        timers.arm(TimerKind::NextSession, &at(16, 0), at(16, 1));
        assert!(timers.cancel(TimerKind::NextSession));
        assert!(!timers.cancel(TimerKind::NextSession));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn past_deadline_fires_immediately() {
        let (mut timers, mut rx) = TimerService::channel();
        timers.arm(TimerKind::NextSession, &at(16, 0), at(15, 0));
        let fired = rx.recv().await.unwrap();
        assert!(timers.accept(fired));
    }
}
