//! Connection handle abstraction

use chrono::{DateTime, Local};
use presence_util::{ChannelId, GuildId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Gateway-assigned identifier for one voice connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Opaque handle to an established voice connection
///
/// Created by the gateway when `connect` succeeds. The core never looks
/// inside it; it only hands it back to `disconnect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    id: ConnectionId,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub established_at: DateTime<Local>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        guild_id: GuildId,
        channel_id: ChannelId,
        established_at: DateTime<Local>,
    ) -> Self {
        Self {
            id,
            guild_id,
            channel_id,
            established_at,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_serialization() {
        let conn = Connection::new(
            ConnectionId::new(7),
            GuildId::new("111"),
            ChannelId::new("222"),
            presence_util::now(),
        );

        let json = serde_json::to_string(&conn).unwrap();
        let parsed: Connection = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id(), ConnectionId::new(7));
        assert_eq!(parsed.channel_id, conn.channel_id);
    }

    #[test]
    fn connection_id_display() {
        assert_eq!(ConnectionId::new(3).to_string(), "conn-3");
    }
}
