//! Core events emitted by the scheduler

use chrono::{DateTime, Local};
use presence_util::{ChannelId, SessionId};
use std::fmt;
use std::time::Duration;

use crate::{SessionEndReason, SessionState};

/// Why a next-session timer firing did not start a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Current hour is outside the active window
    OutsideWindow,
    /// A non-bot member is already in the channel
    ChannelOccupied,
    /// The member list could not be fetched
    MemberListFailed { error: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::OutsideWindow => f.write_str("outside active window"),
            SkipReason::ChannelOccupied => f.write_str("channel occupied"),
            SkipReason::MemberListFailed { error } => write!(f, "member list failed: {}", error),
        }
    }
}

/// Events emitted by the scheduler
///
/// Every transition reports what it did as a list of these, in order. The
/// concatenation of those lists is the scheduler's transition log.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },

    /// Connected and holding the channel
    SessionStarted {
        session_id: SessionId,
        channel_id: ChannelId,
        planned_duration: Duration,
        planned_end: DateTime<Local>,
    },

    /// Session torn down and connection released
    SessionEnded {
        session_id: SessionId,
        reason: SessionEndReason,
        duration: Duration,
    },

    /// A next-session firing did not start a session
    AttemptSkipped { reason: SkipReason },

    NextSessionScheduled {
        at: DateTime<Local>,
        delay: Duration,
    },

    ConnectFailed {
        session_id: SessionId,
        error: String,
    },

    /// End of the active window reached
    DailyReset {
        next_start: DateTime<Local>,
        next_reset: DateTime<Local>,
    },
}
