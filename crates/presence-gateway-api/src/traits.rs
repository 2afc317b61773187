//! Gateway traits

use async_trait::async_trait;
use presence_util::{ChannelId, GuildId};
use std::time::Duration;
use thiserror::Error;

use crate::{Connection, Member, Subscription, SubscriptionId};

/// Errors from gateway operations
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Channel not found: {0}")]
    ChannelNotFound(ChannelId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway trait - implemented by chat platform clients
///
/// Implementations own authentication and the voice transport. The core
/// only asks them to join, leave, list and watch one channel.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Join the voice channel. Resolves once the connection is ready.
    async fn connect(
        &self,
        guild_id: &GuildId,
        channel_id: &ChannelId,
    ) -> GatewayResult<Connection>;

    /// Leave the voice channel. Must be idempotent: releasing an already
    /// closed connection is not an error.
    async fn disconnect(&self, connection: &Connection) -> GatewayResult<()>;

    /// Current members of the channel, including bots
    async fn list_members(&self, channel_id: &ChannelId) -> GatewayResult<Vec<Member>>;

    /// Start receiving membership changes for the channel
    fn subscribe(&self, channel_id: &ChannelId) -> Subscription;

    /// Stop a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, subscription: SubscriptionId);

    /// Optional: check if the gateway session is healthy
    fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        let err = GatewayError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "Timed out after 30s");

        let err = GatewayError::ChannelNotFound(ChannelId::new("222"));
        assert_eq!(err.to_string(), "Channel not found: 222");
    }
}
