//! Occupancy monitor for the managed channel

use presence_gateway_api::{Gateway, GatewayResult, MembershipEvent, Subscription};
use presence_util::{ChannelId, MemberId};
use std::sync::Arc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, warn};

/// Something the session has to react to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OccupancySignal {
    /// A non-bot member entered the channel
    Arrival(MemberId),
    /// The gateway closed the membership feed, arrivals can no longer be seen
    FeedLost,
}

/// Watches who else is in the managed channel
///
/// The membership feed is only subscribed while a session exists. The first
/// signal after [`OccupancyMonitor::attach`] (a non-bot arrival or the loss
/// of the feed) is latched and handed out once; anything after that is
/// ignored until the next attach.
pub struct OccupancyMonitor {
    gateway: Arc<dyn Gateway>,
    channel_id: ChannelId,
    subscription: Option<Subscription>,
    pending: Option<OccupancySignal>,
    signalled: bool,
}

impl OccupancyMonitor {
    pub fn new(gateway: Arc<dyn Gateway>, channel_id: ChannelId) -> Self {
        Self {
            gateway,
            channel_id,
            subscription: None,
            pending: None,
            signalled: false,
        }
    }

    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    /// True iff the channel currently holds at least one non-bot member
    pub async fn has_other_members(&self) -> GatewayResult<bool> {
        let members = self.gateway.list_members(&self.channel_id).await?;
        Ok(members.iter().any(|m| !m.is_bot))
    }

    /// Start watching membership changes. No-op if already attached.
    pub fn attach(&mut self) {
        if self.subscription.is_some() {
            return;
        }
        let subscription = self.gateway.subscribe(&self.channel_id);
        debug!(
            channel_id = %self.channel_id,
            subscription = subscription.id.0,
            "Occupancy monitor attached"
        );
        self.subscription = Some(subscription);
        self.pending = None;
        self.signalled = false;
    }

    /// Stop watching and forget any latched signal
    pub fn detach(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.gateway.unsubscribe(subscription.id);
            debug!(
                channel_id = %self.channel_id,
                subscription = subscription.id.0,
                "Occupancy monitor detached"
            );
        }
        self.pending = None;
        self.signalled = false;
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    fn latch(&mut self, signal: OccupancySignal) {
        if self.signalled || self.pending.is_some() {
            return;
        }
        self.pending = Some(signal);
    }

    fn observe(&mut self, event: MembershipEvent) {
        if event.is_human_arrival_in(&self.channel_id) {
            debug!(member_id = %event.member_id, "Arrival detected");
            self.latch(OccupancySignal::Arrival(event.member_id));
        }
    }

    fn feed_closed(&mut self) {
        warn!(channel_id = %self.channel_id, "Membership feed closed by gateway");
        // The dead subscription stays so attach remains a no-op until the
        // session ends and detach clears it.
        self.latch(OccupancySignal::FeedLost);
    }

    /// Process everything already buffered on the feed without waiting
    pub fn drain(&mut self) {
        let mut buffered = Vec::new();
        let mut closed = false;
        if let Some(subscription) = self.subscription.as_mut() {
            loop {
                match subscription.events.try_recv() {
                    Ok(event) => buffered.push(event),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        closed = true;
                        break;
                    }
                }
            }
        }
        for event in buffered {
            self.observe(event);
        }
        if closed {
            self.feed_closed();
        }
    }

    /// Take the latched signal, if one is pending. Returns `Some` at most
    /// once per attach.
    pub fn take_signal(&mut self) -> Option<OccupancySignal> {
        let signal = self.pending.take()?;
        self.signalled = true;
        Some(signal)
    }

    /// Wait for the next signal
    ///
    /// Pends forever while detached or once a signal has been handed out.
    /// Safe to use as a `select!` branch: an event received by a cancelled
    /// call is latched, not lost.
    pub async fn next_signal(&mut self) -> OccupancySignal {
        loop {
            if let Some(signal) = self.take_signal() {
                return signal;
            }

            let received = match self.subscription.as_mut() {
                Some(subscription) if !self.signalled => subscription.events.recv().await,
                _ => return std::future::pending().await,
            };

            match received {
                Some(event) => self.observe(event),
                None => self.feed_closed(),
            }
        }
    }
}

impl Drop for OccupancyMonitor {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_gateway_api::{Member, MockGateway, SubscriptionId};
    use std::time::Duration;

    fn setup() -> (Arc<MockGateway>, OccupancyMonitor, ChannelId) {
        let gateway = Arc::new(MockGateway::new());
        let channel = ChannelId::new("222");
        let monitor = OccupancyMonitor::new(gateway.clone(), channel.clone());
        (gateway, monitor, channel)
    }

    #[tokio::test]
    async fn bots_do_not_count_as_occupants() {
        let (gateway, monitor, channel) = setup();
        assert!(!monitor.has_other_members().await.unwrap());

        gateway.set_members(&channel, vec![Member::bot("9", "tunes")]);
        assert!(!monitor.has_other_members().await.unwrap());

        gateway.set_members(
            &channel,
            vec![Member::bot("9", "tunes"), Member::human("1", "alice")],
        );
        assert!(monitor.has_other_members().await.unwrap());
    }

    #[tokio::test]
    async fn subscribes_only_while_attached() {
        let (gateway, mut monitor, _) = setup();
        assert_eq!(gateway.subscriber_count(), 0);

        monitor.attach();
        monitor.attach();
        assert_eq!(gateway.subscriber_count(), 1);

        monitor.detach();
        assert_eq!(gateway.subscriber_count(), 0);
        assert!(!monitor.is_attached());
    }

    #[tokio::test]
    async fn first_human_arrival_is_latched_once() {
        let (gateway, mut monitor, channel) = setup();
        monitor.attach();

        gateway.simulate_join(&channel, Member::bot("9", "tunes"));
        gateway.simulate_join(&ChannelId::new("333"), Member::human("5", "elsewhere"));
        gateway.simulate_join(&channel, Member::human("1", "alice"));
        gateway.simulate_join(&channel, Member::human("2", "bob"));

        monitor.drain();
        assert_eq!(
            monitor.take_signal(),
            Some(OccupancySignal::Arrival(MemberId::new("1")))
        );
        monitor.drain();
        assert_eq!(monitor.take_signal(), None);
    }

    #[tokio::test]
    async fn arrivals_before_attach_are_not_seen() {
        let (gateway, mut monitor, channel) = setup();
        gateway.simulate_join(&channel, Member::human("1", "alice"));

        monitor.attach();
        monitor.drain();
        assert_eq!(monitor.take_signal(), None);
    }

    #[tokio::test]
    async fn closed_feed_is_signalled_once() {
        let (gateway, mut monitor, channel) = setup();
        monitor.attach();
        assert_eq!(gateway.subscriber_count(), 1);

        // Gateway drops the feed; later arrivals can no longer reach us
        gateway.unsubscribe(SubscriptionId(1));
        gateway.simulate_join(&channel, Member::human("1", "alice"));

        monitor.drain();
        assert_eq!(monitor.take_signal(), Some(OccupancySignal::FeedLost));
        monitor.drain();
        assert_eq!(monitor.take_signal(), None);

        // Attach stays a no-op until the dead feed is detached
        monitor.attach();
        assert_eq!(gateway.subscriber_count(), 0);
        monitor.detach();
        monitor.attach();
        assert_eq!(gateway.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn next_signal_reports_a_closed_feed() {
        let (gateway, mut monitor, _) = setup();
        monitor.attach();

        let closer = {
            let gateway = gateway.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                gateway.unsubscribe(SubscriptionId(1));
            })
        };

        assert_eq!(monitor.next_signal().await, OccupancySignal::FeedLost);
        closer.await.unwrap();
    }

    #[tokio::test]
    async fn next_signal_waits_for_a_human() {
        let (gateway, mut monitor, channel) = setup();
        monitor.attach();

        let feeder = {
            let gateway = gateway.clone();
            let channel = channel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                gateway.simulate_join(&channel, Member::bot("9", "tunes"));
                gateway.simulate_join(&channel, Member::human("1", "alice"));
            })
        };

        let signal = monitor.next_signal().await;
        assert_eq!(signal, OccupancySignal::Arrival(MemberId::new("1")));
        feeder.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn next_signal_pends_when_detached() {
        let (_gateway, mut monitor, _) = setup();
        let waited = tokio::time::timeout(Duration::from_secs(5), monitor.next_signal()).await;
        assert!(waited.is_err());
    }
}
