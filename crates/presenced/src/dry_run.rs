//! Gateway that only logs
//!
//! Lets the scheduler run end to end (window checks, timers, daily reset)
//! on a machine with no platform credentials. It always connects, never
//! reports members and never emits membership events.

use async_trait::async_trait;
use presence_gateway_api::{
    Connection, ConnectionId, Gateway, GatewayResult, Member, MembershipEvent, Subscription,
    SubscriptionId,
};
use presence_util::{ChannelId, GuildId};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::info;

pub struct DryRunGateway {
    next_id: AtomicU64,
    // Held so subscriptions stay open until unsubscribed
    feeds: Mutex<HashMap<SubscriptionId, mpsc::UnboundedSender<MembershipEvent>>>,
}

impl DryRunGateway {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            feeds: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for DryRunGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gateway for DryRunGateway {
    async fn connect(
        &self,
        guild_id: &GuildId,
        channel_id: &ChannelId,
    ) -> GatewayResult<Connection> {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        info!(%guild_id, %channel_id, connection = %id, "[dry run] Joined voice channel");
        Ok(Connection::new(
            id,
            guild_id.clone(),
            channel_id.clone(),
            presence_util::now(),
        ))
    }

    async fn disconnect(&self, connection: &Connection) -> GatewayResult<()> {
        info!(
            channel_id = %connection.channel_id,
            connection = %connection.id(),
            "[dry run] Left voice channel"
        );
        Ok(())
    }

    async fn list_members(&self, _channel_id: &ChannelId) -> GatewayResult<Vec<Member>> {
        Ok(Vec::new())
    }

    fn subscribe(&self, _channel_id: &ChannelId) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.feeds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, tx);
        Subscription { id, events: rx }
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        self.feeds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&subscription);
    }
}
