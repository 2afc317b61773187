//! Mock gateway for testing

use async_trait::async_trait;
use presence_util::{ChannelId, GuildId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::{
    Connection, ConnectionId, Gateway, GatewayError, GatewayResult, Member, MembershipEvent,
    Subscription, SubscriptionId,
};

type Feed = (ChannelId, mpsc::UnboundedSender<MembershipEvent>);

/// In-memory gateway for unit/integration testing
///
/// Channels start empty. Tests populate them with [`MockGateway::set_members`]
/// or [`MockGateway::simulate_join`], which also notifies subscribers.
pub struct MockGateway {
    next_id: AtomicU64,
    members: Mutex<HashMap<ChannelId, Vec<Member>>>,
    live: Mutex<HashMap<ConnectionId, Connection>>,
    subscribers: Mutex<HashMap<SubscriptionId, Feed>>,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,

    /// Configure connect to fail
    pub fail_connect: Arc<Mutex<bool>>,

    /// Configure disconnect to fail
    pub fail_disconnect: Arc<Mutex<bool>>,

    /// Configure list_members to fail
    pub fail_list_members: Arc<Mutex<bool>>,

    /// Delay before connect resolves (simulates a slow voice handshake)
    pub connect_delay: Arc<Mutex<Option<Duration>>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            members: Mutex::new(HashMap::new()),
            live: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            fail_connect: Arc::new(Mutex::new(false)),
            fail_disconnect: Arc::new(Mutex::new(false)),
            fail_list_members: Arc::new(Mutex::new(false)),
            connect_delay: Arc::new(Mutex::new(None)),
        }
    }

    /// Replace the member list of a channel without emitting events
    pub fn set_members(&self, channel_id: &ChannelId, members: Vec<Member>) {
        self.members
            .lock()
            .unwrap()
            .insert(channel_id.clone(), members);
    }

    /// Add a member to the channel and notify subscribers
    pub fn simulate_join(&self, channel_id: &ChannelId, member: Member) {
        let event = MembershipEvent::joined(channel_id.clone(), &member);
        self.members
            .lock()
            .unwrap()
            .entry(channel_id.clone())
            .or_default()
            .push(member);
        self.publish(event);
    }

    /// Remove a member from the channel and notify subscribers
    pub fn simulate_leave(&self, channel_id: &ChannelId, member: &Member) {
        if let Some(members) = self.members.lock().unwrap().get_mut(channel_id) {
            members.retain(|m| m.id != member.id);
        }
        self.publish(MembershipEvent::left(channel_id.clone(), member));
    }

    /// Deliver an arbitrary event to every subscriber (of any channel),
    /// the way a platform-wide voice state feed would
    pub fn publish(&self, event: MembershipEvent) {
        let subscribers = self.subscribers.lock().unwrap();
        for (_, tx) in subscribers.values() {
            let _ = tx.send(event.clone());
        }
    }

    /// Connections that have been established and not yet released
    pub fn live_connections(&self) -> Vec<Connection> {
        self.live.lock().unwrap().values().cloned().collect()
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    /// Number of open membership subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    pub fn set_fail_connect(&self, fail: bool) {
        *self.fail_connect.lock().unwrap() = fail;
    }

    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        *self.connect_delay.lock().unwrap() = delay;
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn connect(
        &self,
        guild_id: &GuildId,
        channel_id: &ChannelId,
    ) -> GatewayResult<Connection> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.connect_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.fail_connect.lock().unwrap() {
            return Err(GatewayError::ConnectFailed("Mock connect failure".into()));
        }

        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let connection = Connection::new(
            id,
            guild_id.clone(),
            channel_id.clone(),
            presence_util::now(),
        );

        self.live.lock().unwrap().insert(id, connection.clone());

        Ok(connection)
    }

    async fn disconnect(&self, connection: &Connection) -> GatewayResult<()> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);

        if *self.fail_disconnect.lock().unwrap() {
            return Err(GatewayError::Transport("Mock disconnect failure".into()));
        }

        // Already released is fine
        if self.live.lock().unwrap().remove(&connection.id()).is_none() {
            tracing::debug!(
                connection = %connection.id(),
                "Mock disconnect of released connection"
            );
        }
        Ok(())
    }

    async fn list_members(&self, channel_id: &ChannelId) -> GatewayResult<Vec<Member>> {
        if *self.fail_list_members.lock().unwrap() {
            return Err(GatewayError::Transport("Mock member list failure".into()));
        }

        Ok(self
            .members
            .lock()
            .unwrap()
            .get(channel_id)
            .cloned()
            .unwrap_or_default())
    }

    fn subscribe(&self, channel_id: &ChannelId) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscribers
            .lock()
            .unwrap()
            .insert(id, (channel_id.clone(), tx));

        Subscription { id, events: rx }
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        self.subscribers.lock().unwrap().remove(&subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MembershipChange;

    #[tokio::test]
    async fn mock_connect_and_disconnect() {
        let gateway = MockGateway::new();
        let guild = GuildId::new("111");
        let channel = ChannelId::new("222");

        let conn = gateway.connect(&guild, &channel).await.unwrap();
        assert_eq!(gateway.live_connections().len(), 1);
        assert_eq!(conn.channel_id, channel);

        gateway.disconnect(&conn).await.unwrap();
        assert!(gateway.live_connections().is_empty());

        // Idempotent
        gateway.disconnect(&conn).await.unwrap();
        assert_eq!(gateway.disconnect_calls(), 2);
    }

    #[tokio::test]
    async fn mock_connect_failure() {
        let gateway = MockGateway::new();
        gateway.set_fail_connect(true);

        let result = gateway
            .connect(&GuildId::new("111"), &ChannelId::new("222"))
            .await;

        assert!(matches!(result, Err(GatewayError::ConnectFailed(_))));
        assert!(gateway.live_connections().is_empty());
        assert_eq!(gateway.connect_calls(), 1);
    }

    #[tokio::test]
    async fn join_updates_members_and_notifies() {
        let gateway = MockGateway::new();
        let channel = ChannelId::new("222");
        let mut sub = gateway.subscribe(&channel);

        let alice = Member::human("1", "alice");
        gateway.simulate_join(&channel, alice.clone());

        let members = gateway.list_members(&channel).await.unwrap();
        assert_eq!(members, vec![alice.clone()]);

        let event = sub.events.recv().await.unwrap();
        assert_eq!(event.kind, MembershipChange::Joined);
        assert_eq!(event.member_id, alice.id);

        gateway.simulate_leave(&channel, &alice);
        assert!(gateway.list_members(&channel).await.unwrap().is_empty());
        let event = sub.events.recv().await.unwrap();
        assert_eq!(event.kind, MembershipChange::Left);
    }

    #[tokio::test]
    async fn unsubscribe_closes_feed() {
        let gateway = MockGateway::new();
        let channel = ChannelId::new("222");
        let mut sub = gateway.subscribe(&channel);
        assert_eq!(gateway.subscriber_count(), 1);

        gateway.unsubscribe(sub.id);
        assert_eq!(gateway.subscriber_count(), 0);
        assert!(sub.events.recv().await.is_none());
    }
}
