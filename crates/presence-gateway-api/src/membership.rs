//! Channel membership types

use presence_util::{ChannelId, MemberId};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A participant currently in a voice channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub display_name: String,
    pub is_bot: bool,
}

impl Member {
    pub fn human(id: impl Into<MemberId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            is_bot: false,
        }
    }

    pub fn bot(id: impl Into<MemberId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            is_bot: true,
        }
    }
}

/// Whether a member entered or left the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipChange {
    Joined,
    Left,
}

/// A membership change reported by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipEvent {
    pub channel_id: ChannelId,
    pub member_id: MemberId,
    pub is_bot: bool,
    pub kind: MembershipChange,
}

impl MembershipEvent {
    pub fn joined(channel_id: ChannelId, member: &Member) -> Self {
        Self {
            channel_id,
            member_id: member.id.clone(),
            is_bot: member.is_bot,
            kind: MembershipChange::Joined,
        }
    }

    pub fn left(channel_id: ChannelId, member: &Member) -> Self {
        Self {
            channel_id,
            member_id: member.id.clone(),
            is_bot: member.is_bot,
            kind: MembershipChange::Left,
        }
    }

    /// A non-bot member joined `channel`
    pub fn is_human_arrival_in(&self, channel: &ChannelId) -> bool {
        self.kind == MembershipChange::Joined && !self.is_bot && &self.channel_id == channel
    }
}

/// Identifier of one membership subscription, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A live membership feed for one channel
///
/// Events arrive in the order the platform delivered them. The feed ends
/// (the receiver yields `None`) once the gateway drops the subscription.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub events: mpsc::UnboundedReceiver<MembershipEvent>,
}
