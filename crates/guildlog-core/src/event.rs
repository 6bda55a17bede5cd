//! Canonical event record produced by the normalizer and consumed by the pipeline.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{ChannelId, SubjectId, TenantId, UserId},
    errors::Error,
};

/// A class of lifecycle event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    MessageCreated,
    MessageEdited,
    MessageDeleted,
    MemberJoined,
    MemberLeft,
    MemberUpdated,
    ChannelCreated,
    ChannelDeleted,
    ChannelUpdated,
    RoleCreated,
    RoleDeleted,
    RoleUpdated,
    VoiceStateChanged,
    ReactionAdded,
    ReactionRemoved,
    GuildUpdated,
    PresenceUpdated,
}

impl Category {
    pub const ALL: [Category; 17] = [
        Category::MessageCreated,
        Category::MessageEdited,
        Category::MessageDeleted,
        Category::MemberJoined,
        Category::MemberLeft,
        Category::MemberUpdated,
        Category::ChannelCreated,
        Category::ChannelDeleted,
        Category::ChannelUpdated,
        Category::RoleCreated,
        Category::RoleDeleted,
        Category::RoleUpdated,
        Category::VoiceStateChanged,
        Category::ReactionAdded,
        Category::ReactionRemoved,
        Category::GuildUpdated,
        Category::PresenceUpdated,
    ];

    /// The toggle group an administrator enables/disables this category through.
    pub fn group(self) -> CategoryGroup {
        match self {
            Category::MessageCreated
            | Category::MessageEdited
            | Category::MessageDeleted
            | Category::ReactionAdded
            | Category::ReactionRemoved => CategoryGroup::Messages,
            Category::MemberJoined | Category::MemberLeft | Category::MemberUpdated => {
                CategoryGroup::Members
            }
            Category::ChannelCreated
            | Category::ChannelDeleted
            | Category::ChannelUpdated
            | Category::GuildUpdated => CategoryGroup::Channels,
            Category::RoleCreated | Category::RoleDeleted | Category::RoleUpdated => {
                CategoryGroup::Roles
            }
            Category::VoiceStateChanged => CategoryGroup::Voice,
            Category::PresenceUpdated => CategoryGroup::Presence,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::MessageCreated => "message-created",
            Category::MessageEdited => "message-edited",
            Category::MessageDeleted => "message-deleted",
            Category::MemberJoined => "member-joined",
            Category::MemberLeft => "member-left",
            Category::MemberUpdated => "member-updated",
            Category::ChannelCreated => "channel-created",
            Category::ChannelDeleted => "channel-deleted",
            Category::ChannelUpdated => "channel-updated",
            Category::RoleCreated => "role-created",
            Category::RoleDeleted => "role-deleted",
            Category::RoleUpdated => "role-updated",
            Category::VoiceStateChanged => "voice-state-changed",
            Category::ReactionAdded => "reaction-added",
            Category::ReactionRemoved => "reaction-removed",
            Category::GuildUpdated => "guild-updated",
            Category::PresenceUpdated => "presence-updated",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Administrator-facing toggle groups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CategoryGroup {
    Messages,
    Members,
    Channels,
    Roles,
    Voice,
    Presence,
}

impl CategoryGroup {
    pub const ALL: [CategoryGroup; 6] = [
        CategoryGroup::Messages,
        CategoryGroup::Members,
        CategoryGroup::Channels,
        CategoryGroup::Roles,
        CategoryGroup::Voice,
        CategoryGroup::Presence,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CategoryGroup::Messages => "messages",
            CategoryGroup::Members => "members",
            CategoryGroup::Channels => "channels",
            CategoryGroup::Roles => "roles",
            CategoryGroup::Voice => "voice",
            CategoryGroup::Presence => "presence",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CategoryGroup::Messages => "Messages",
            CategoryGroup::Members => "Members",
            CategoryGroup::Channels => "Channels",
            CategoryGroup::Roles => "Roles",
            CategoryGroup::Voice => "Voice activity",
            CategoryGroup::Presence => "Presence",
        }
    }
}

impl fmt::Display for CategoryGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryGroup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        let group = match name.as_str() {
            "messages" | "message" => CategoryGroup::Messages,
            "members" | "member" => CategoryGroup::Members,
            "channels" | "channel" => CategoryGroup::Channels,
            "roles" | "role" => CategoryGroup::Roles,
            "voice" => CategoryGroup::Voice,
            "presence" => CategoryGroup::Presence,
            _ => {
                return Err(Error::InvalidCategory {
                    name: s.trim().to_string(),
                })
            }
        };
        Ok(group)
    }
}

/// Enabled flag per [`CategoryGroup`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryToggles {
    #[serde(default = "enabled")]
    pub messages: bool,
    #[serde(default = "enabled")]
    pub members: bool,
    #[serde(default = "enabled")]
    pub channels: bool,
    #[serde(default = "enabled")]
    pub roles: bool,
    #[serde(default = "enabled")]
    pub voice: bool,
    #[serde(default = "enabled")]
    pub presence: bool,
}

fn enabled() -> bool {
    true
}

impl CategoryToggles {
    pub fn all_enabled() -> Self {
        Self {
            messages: true,
            members: true,
            channels: true,
            roles: true,
            voice: true,
            presence: true,
        }
    }

    pub fn get(&self, group: CategoryGroup) -> bool {
        match group {
            CategoryGroup::Messages => self.messages,
            CategoryGroup::Members => self.members,
            CategoryGroup::Channels => self.channels,
            CategoryGroup::Roles => self.roles,
            CategoryGroup::Voice => self.voice,
            CategoryGroup::Presence => self.presence,
        }
    }

    pub fn set(&mut self, group: CategoryGroup, value: bool) {
        let slot = match group {
            CategoryGroup::Messages => &mut self.messages,
            CategoryGroup::Members => &mut self.members,
            CategoryGroup::Channels => &mut self.channels,
            CategoryGroup::Roles => &mut self.roles,
            CategoryGroup::Voice => &mut self.voice,
            CategoryGroup::Presence => &mut self.presence,
        };
        *slot = value;
    }

    /// Flip a group and return the new value.
    pub fn toggle(&mut self, group: CategoryGroup) -> bool {
        let next = !self.get(group);
        self.set(group, next);
        next
    }

    pub fn allows(&self, category: Category) -> bool {
        self.get(category.group())
    }
}

impl Default for CategoryToggles {
    fn default() -> Self {
        Self::all_enabled()
    }
}

/// The user an event is attributed to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub name: String,
    /// Legacy `#1234` tag; `None` for migrated usernames.
    pub discriminator: Option<u16>,
    pub avatar_url: Option<String>,
}

impl Actor {
    /// Canonical reference: mention, raw id, then the account name.
    pub fn reference(&self) -> String {
        let tag = match self.discriminator {
            Some(d) if d != 0 => format!("{}#{:04}", self.name, d),
            _ => self.name.clone(),
        };
        format!("{} (`{}`)\n{}", self.id.mention(), self.id, tag)
    }
}

/// A channel an event happened in (or is about).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelRef {
    pub id: ChannelId,
    pub name: String,
    pub parent_name: Option<String>,
}

impl ChannelRef {
    pub fn reference(&self) -> String {
        match &self.parent_name {
            Some(parent) => format!("{} (`{}`) in {}", self.id.mention(), self.id, parent),
            None => format!("{} (`{}`)", self.id.mention(), self.id),
        }
    }
}

/// Payload attribute keys shared by the normalizer and the formatter.
pub mod keys {
    pub const CONTENT: &str = "content";
    pub const CONTENT_BEFORE: &str = "content_before";
    pub const CONTENT_AFTER: &str = "content_after";
    pub const ATTACHMENTS: &str = "attachments";
    pub const EMBEDS: &str = "embeds";
    pub const MESSAGE_ID: &str = "message_id";
    pub const CREATED_AT: &str = "created_at";
    pub const ACCOUNT_CREATED_AT: &str = "account_created_at";
    pub const ACCOUNT_AGE_DAYS: &str = "account_age_days";
    pub const NEW_ACCOUNT: &str = "new_account";
    pub const JOINED_AT: &str = "joined_at";
    pub const TIME_IN_GUILD: &str = "time_in_guild";
    pub const MEMBER_COUNT: &str = "member_count";
    pub const CHANGES: &str = "changes";
    pub const CHANNEL_KIND: &str = "channel_kind";
    pub const CHANNEL_PARENT: &str = "channel_parent";
    pub const POSITION: &str = "position";
    pub const ROLE_ID: &str = "role_id";
    pub const ROLE_NAME: &str = "role_name";
    pub const ROLE_COLOR: &str = "role_color";
    pub const PERMISSION_COUNT: &str = "permission_count";
    pub const PERMISSIONS_CHANGED: &str = "permissions_changed";
    pub const VOICE_ACTION: &str = "voice_action";
    pub const VOICE_FROM: &str = "voice_from";
    pub const VOICE_TO: &str = "voice_to";
    pub const CHANNEL_MEMBERS: &str = "channel_members";
    pub const EMOJI: &str = "emoji";
    pub const REACTION_COUNT: &str = "reaction_count";
    pub const GUILD_NAME: &str = "guild_name";
    pub const STATUS_BEFORE: &str = "status_before";
    pub const STATUS_AFTER: &str = "status_after";
}

/// Category-specific key/value attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Payload(BTreeMap<&'static str, String>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.0.insert(key, value.into());
        self
    }

    /// Insert only when a value is present; absent attributes stay absent.
    pub fn with_opt(mut self, key: &'static str, value: Option<impl Into<String>>) -> Self {
        if let Some(v) = value {
            self.0.insert(key, v.into());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.get(key) == Some("true")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Immutable canonical event; discarded after dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub category: Category,
    pub tenant_id: TenantId,
    pub subject_id: SubjectId,
    pub occurred_at: DateTime<Utc>,
    pub actor: Option<Actor>,
    pub channel: Option<ChannelRef>,
    pub payload: Payload,
}
