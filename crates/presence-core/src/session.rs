//! Session state machine types

use chrono::{DateTime, Local};
use presence_gateway_api::Connection;
use presence_util::{ChannelId, SessionId};
use std::fmt;
use std::time::Duration;

/// Where the scheduler is in the connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Active,
    Disconnecting,
}

impl SessionState {
    /// A session exists (the channel is occupied or about to be)
    pub fn has_session(&self) -> bool {
        !matches!(self, SessionState::Idle)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
            SessionState::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

/// Why a session was torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEndReason {
    /// Planned duration elapsed
    DurationElapsed,
    /// A real participant joined the channel
    MemberJoined,
    /// End of the active window
    DailyReset,
    /// The connection could not be established
    ConnectFailed,
    /// The membership feed closed, arrivals could no longer be seen
    FeedLost,
    /// Process is exiting
    Shutdown,
}

impl fmt::Display for SessionEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionEndReason::DurationElapsed => "duration_elapsed",
            SessionEndReason::MemberJoined => "member_joined",
            SessionEndReason::DailyReset => "daily_reset",
            SessionEndReason::ConnectFailed => "connect_failed",
            SessionEndReason::FeedLost => "feed_lost",
            SessionEndReason::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// One occupancy episode of the managed channel
///
/// Created when the scheduler decides to connect and dropped once the
/// vacate routine has released its connection. The connection is owned
/// here and nowhere else.
#[derive(Debug)]
pub struct Session {
    pub session_id: SessionId,
    pub channel_id: ChannelId,
    connection: Option<Connection>,
    planned_duration: Option<Duration>,
    pub started_at: DateTime<Local>,
}

impl Session {
    /// A session whose connect is in flight
    pub fn connecting(channel_id: ChannelId, now: DateTime<Local>) -> Self {
        Self {
            session_id: SessionId::new(),
            channel_id,
            connection: None,
            planned_duration: None,
            started_at: now,
        }
    }

    /// Record the established connection and the sampled duration
    pub fn activate(
        &mut self,
        connection: Connection,
        planned_duration: Duration,
        now: DateTime<Local>,
    ) {
        self.connection = Some(connection);
        self.planned_duration = Some(planned_duration);
        self.started_at = now;
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    /// Hand the connection to the vacate routine
    pub fn take_connection(&mut self) -> Option<Connection> {
        self.connection.take()
    }

    pub fn planned_duration(&self) -> Option<Duration> {
        self.planned_duration
    }

    /// When the session is due to end, once active
    pub fn planned_end(&self) -> Option<DateTime<Local>> {
        let planned = chrono::Duration::from_std(self.planned_duration?).ok()?;
        Some(self.started_at + planned)
    }

    pub fn elapsed(&self, now: DateTime<Local>) -> Duration {
        presence_util::duration_until(&self.started_at, &now)
    }
}
