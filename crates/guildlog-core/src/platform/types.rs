//! Platform-neutral inbound callbacks with before/after state.
//!
//! Platform-specific fields stay in the adapter; these carry only what the
//! normalizer reads.

use chrono::{DateTime, Utc};

use crate::{
    domain::{ChannelId, MessageId, RoleId, TenantId, UserId},
    event::ChannelRef,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserSnapshot {
    pub id: UserId,
    pub name: String,
    pub discriminator: Option<u16>,
    pub avatar_url: Option<String>,
    pub bot: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageSnapshot {
    pub id: MessageId,
    /// `None` in direct messages.
    pub tenant_id: Option<TenantId>,
    pub channel: ChannelRef,
    pub author: UserSnapshot,
    pub content: String,
    pub attachments: usize,
    pub embeds: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RoleRef {
    pub id: RoleId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberSnapshot {
    pub tenant_id: TenantId,
    pub user: UserSnapshot,
    pub nickname: Option<String>,
    pub roles: Vec<RoleRef>,
    pub joined_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelSnapshot {
    pub tenant_id: TenantId,
    pub id: ChannelId,
    pub name: String,
    /// Human label such as `Text`, `Voice` or `Category`.
    pub kind: String,
    pub parent_name: Option<String>,
    pub position: i64,
    pub topic: Option<String>,
    pub nsfw: bool,
    pub slowmode_secs: u16,
}

impl ChannelSnapshot {
    pub fn as_ref(&self) -> ChannelRef {
        ChannelRef {
            id: self.id,
            name: self.name.clone(),
            parent_name: self.parent_name.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleSnapshot {
    pub tenant_id: TenantId,
    pub id: RoleId,
    pub name: String,
    pub color: u32,
    pub position: i64,
    /// Raw permission bitset.
    pub permissions: u64,
    pub hoist: bool,
    pub mentionable: bool,
    pub member_count: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionSnapshot {
    pub tenant_id: Option<TenantId>,
    pub user: UserSnapshot,
    pub channel: ChannelRef,
    pub message_id: MessageId,
    pub emoji: String,
    /// Reactions of this emoji on the message, when the message is cached.
    pub count: Option<u64>,
    pub message_content: Option<String>,
    pub message_author_bot: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuildSnapshot {
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub verification_level: String,
    pub icon_url: Option<String>,
}

/// One platform callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawEvent {
    MessageCreated(MessageSnapshot),
    MessageEdited {
        before: Option<MessageSnapshot>,
        after: MessageSnapshot,
    },
    MessageDeleted(MessageSnapshot),
    MemberJoined {
        member: MemberSnapshot,
        member_count: Option<u64>,
    },
    MemberLeft {
        tenant_id: TenantId,
        user: UserSnapshot,
        joined_at: Option<DateTime<Utc>>,
        member_count: Option<u64>,
    },
    MemberUpdated {
        before: Option<MemberSnapshot>,
        after: MemberSnapshot,
    },
    ChannelCreated(ChannelSnapshot),
    ChannelDeleted(ChannelSnapshot),
    ChannelUpdated {
        before: Option<ChannelSnapshot>,
        after: ChannelSnapshot,
    },
    RoleCreated(RoleSnapshot),
    RoleDeleted(RoleSnapshot),
    RoleUpdated {
        before: Option<RoleSnapshot>,
        after: RoleSnapshot,
    },
    VoiceStateChanged {
        tenant_id: Option<TenantId>,
        user: UserSnapshot,
        before: Option<ChannelRef>,
        after: Option<ChannelRef>,
        /// Occupancy of the channel joined (or left, when leaving).
        channel_members: Option<usize>,
    },
    ReactionAdded(ReactionSnapshot),
    ReactionRemoved(ReactionSnapshot),
    GuildUpdated {
        before: Option<GuildSnapshot>,
        after: GuildSnapshot,
    },
    PresenceUpdated {
        tenant_id: TenantId,
        user: UserSnapshot,
        before: Option<String>,
        after: String,
    },
}

impl RawEvent {
    /// The guild the callback happened in; `None` for direct-message context.
    pub fn tenant_id(&self) -> Option<TenantId> {
        match self {
            RawEvent::MessageCreated(m) | RawEvent::MessageDeleted(m) => m.tenant_id,
            RawEvent::MessageEdited { after, .. } => after.tenant_id,
            RawEvent::MemberJoined { member, .. } => Some(member.tenant_id),
            RawEvent::MemberLeft { tenant_id, .. } => Some(*tenant_id),
            RawEvent::MemberUpdated { after, .. } => Some(after.tenant_id),
            RawEvent::ChannelCreated(c) | RawEvent::ChannelDeleted(c) => Some(c.tenant_id),
            RawEvent::ChannelUpdated { after, .. } => Some(after.tenant_id),
            RawEvent::RoleCreated(r) | RawEvent::RoleDeleted(r) => Some(r.tenant_id),
            RawEvent::RoleUpdated { after, .. } => Some(after.tenant_id),
            RawEvent::VoiceStateChanged { tenant_id, .. } => *tenant_id,
            RawEvent::ReactionAdded(r) | RawEvent::ReactionRemoved(r) => r.tenant_id,
            RawEvent::GuildUpdated { after, .. } => Some(after.tenant_id),
            RawEvent::PresenceUpdated { tenant_id, .. } => Some(*tenant_id),
        }
    }
}
