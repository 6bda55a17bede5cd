//! serenity models → core snapshots.
//!
//! Cache lookups here are synchronous and never held across an await.

use chrono::{DateTime, Utc};
use serenity::{
    all::{
        Cache, ChannelType, Guild, GuildChannel, Member, Message, MessageReaction, PartialGuild,
        ReactionType, Role, User,
    },
    model::{id, Timestamp},
};

use guildlog_core::{
    domain::{ChannelId, MessageId, RoleId, TenantId, UserId},
    event::ChannelRef,
    platform::types::{
        ChannelSnapshot, GuildSnapshot, MemberSnapshot, MessageSnapshot, RoleRef, RoleSnapshot,
        UserSnapshot,
    },
};

pub fn timestamp(ts: Timestamp) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(ts.unix_timestamp(), 0).unwrap_or_default()
}

pub fn tenant(guild_id: id::GuildId) -> TenantId {
    TenantId(guild_id.get())
}

pub fn user(u: &User) -> UserSnapshot {
    UserSnapshot {
        id: UserId(u.id.get()),
        name: u.name.clone(),
        discriminator: u.discriminator.map(|d| d.get()),
        avatar_url: Some(u.face()),
        bot: u.bot,
        created_at: timestamp(u.id.created_at()),
    }
}

fn channel_kind(kind: ChannelType) -> &'static str {
    match kind {
        ChannelType::Text => "Text",
        ChannelType::Voice => "Voice",
        ChannelType::Category => "Category",
        ChannelType::News => "Announcement",
        ChannelType::Stage => "Stage",
        ChannelType::Forum => "Forum",
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread => {
            "Thread"
        }
        _ => "Other",
    }
}

fn channel_name(cache: &Cache, guild_id: id::GuildId, channel_id: id::ChannelId) -> Option<String> {
    let guild = cache.guild(guild_id)?;
    guild.channels.get(&channel_id).map(|c| c.name.clone())
}

/// Reference to a channel by id, named from the cache when possible.
pub fn channel_ref(
    cache: &Cache,
    guild_id: Option<id::GuildId>,
    channel_id: id::ChannelId,
) -> ChannelRef {
    let (name, parent_name) = guild_id
        .and_then(|g| {
            let guild = cache.guild(g)?;
            let gc = guild.channels.get(&channel_id)?;
            let parent = gc
                .parent_id
                .and_then(|p| guild.channels.get(&p).map(|c| c.name.clone()));
            Some((gc.name.clone(), parent))
        })
        .unwrap_or_else(|| (channel_id.get().to_string(), None));
    ChannelRef {
        id: ChannelId(channel_id.get()),
        name,
        parent_name,
    }
}

pub fn message(cache: &Cache, m: &Message) -> MessageSnapshot {
    MessageSnapshot {
        id: MessageId(m.id.get()),
        tenant_id: m.guild_id.map(tenant),
        channel: channel_ref(cache, m.guild_id, m.channel_id),
        author: user(&m.author),
        content: m.content.clone(),
        attachments: m.attachments.len(),
        embeds: m.embeds.len(),
        created_at: timestamp(m.timestamp),
    }
}

pub fn member(cache: &Cache, m: &Member) -> MemberSnapshot {
    let role_name = |role_id: &id::RoleId| {
        cache
            .guild(m.guild_id)
            .and_then(|g| g.roles.get(role_id).map(|r| r.name.clone()))
            .unwrap_or_else(|| role_id.get().to_string())
    };
    MemberSnapshot {
        tenant_id: tenant(m.guild_id),
        user: user(&m.user),
        nickname: m.nick.clone(),
        roles: m
            .roles
            .iter()
            .map(|r| RoleRef {
                id: RoleId(r.get()),
                name: role_name(r),
            })
            .collect(),
        joined_at: m.joined_at.map(timestamp),
    }
}

pub fn channel(cache: &Cache, c: &GuildChannel) -> ChannelSnapshot {
    ChannelSnapshot {
        tenant_id: tenant(c.guild_id),
        id: ChannelId(c.id.get()),
        name: c.name.clone(),
        kind: channel_kind(c.kind).to_string(),
        parent_name: c.parent_id.and_then(|p| channel_name(cache, c.guild_id, p)),
        position: i64::from(c.position),
        topic: c.topic.clone(),
        nsfw: c.nsfw,
        slowmode_secs: c.rate_limit_per_user.map(u16::from).unwrap_or(0),
    }
}

/// Members holding the role, when the guild's member list is cached.
pub fn role_member_count(
    cache: &Cache,
    guild_id: id::GuildId,
    role_id: id::RoleId,
) -> Option<usize> {
    let guild = cache.guild(guild_id)?;
    let n = guild
        .members
        .values()
        .filter(|m| m.roles.contains(&role_id))
        .count();
    Some(n)
}

pub fn role(cache: &Cache, r: &Role) -> RoleSnapshot {
    RoleSnapshot {
        tenant_id: tenant(r.guild_id),
        id: RoleId(r.id.get()),
        name: r.name.clone(),
        color: r.colour.0,
        position: i64::from(r.position),
        permissions: r.permissions.bits(),
        hoist: r.hoist,
        mentionable: r.mentionable,
        member_count: role_member_count(cache, r.guild_id, r.id),
    }
}

/// Placeholder for a deleted role the cache never saw.
pub fn unknown_role(guild_id: id::GuildId, role_id: id::RoleId) -> RoleSnapshot {
    RoleSnapshot {
        tenant_id: tenant(guild_id),
        id: RoleId(role_id.get()),
        name: "Unknown".to_string(),
        color: 0,
        position: 0,
        permissions: 0,
        hoist: false,
        mentionable: false,
        member_count: None,
    }
}

pub fn guild(g: &Guild) -> GuildSnapshot {
    GuildSnapshot {
        tenant_id: tenant(g.id),
        name: g.name.clone(),
        description: g.description.clone(),
        owner_id: UserId(g.owner_id.get()),
        verification_level: format!("{:?}", g.verification_level),
        icon_url: g.icon_url(),
    }
}

pub fn partial_guild(g: &PartialGuild) -> GuildSnapshot {
    GuildSnapshot {
        tenant_id: tenant(g.id),
        name: g.name.clone(),
        description: g.description.clone(),
        owner_id: UserId(g.owner_id.get()),
        verification_level: format!("{:?}", g.verification_level),
        icon_url: g.icon_url(),
    }
}

/// Current count of `emoji` among a cached message's reactions.
pub fn reaction_count(reactions: &[MessageReaction], emoji: &ReactionType) -> Option<u64> {
    reactions
        .iter()
        .find(|r| &r.reaction_type == emoji)
        .map(|r| r.count)
}

pub fn member_count(cache: &Cache, guild_id: id::GuildId) -> Option<u64> {
    cache.guild(guild_id).map(|g| g.member_count)
}

/// Users currently connected to a voice channel.
pub fn voice_occupancy(
    cache: &Cache,
    guild_id: id::GuildId,
    channel_id: id::ChannelId,
) -> Option<usize> {
    let guild = cache.guild(guild_id)?;
    let n = guild
        .voice_states
        .values()
        .filter(|v| v.channel_id == Some(channel_id))
        .count();
    Some(n)
}
