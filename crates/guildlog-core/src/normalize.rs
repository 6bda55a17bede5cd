//! Raw platform callbacks → canonical [`Event`]s.
//!
//! Bot accounts and direct-message context never produce an event. Updates
//! without an observable difference are dropped here as well.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::{
    domain::{ChannelId, SubjectId, TenantId},
    event::{keys, Actor, Category, ChannelRef, Event, Payload},
    formatting::{format_datetime, format_duration},
    platform::types::{
        ChannelSnapshot, GuildSnapshot, MemberSnapshot, MessageSnapshot, RawEvent, ReactionSnapshot,
        RoleRef, RoleSnapshot, UserSnapshot,
    },
};

/// Messages shorter than this with nothing attached are not worth a card.
const NOTABLE_CONTENT_LEN: usize = 10;

/// Reactions on member messages are only reported for these emoji.
const NOTABLE_REACTIONS: [&str; 6] = ["❤️", "❤", "👍", "👎", "🔥", "💯"];

pub const DEFAULT_NEW_ACCOUNT_THRESHOLD_DAYS: i64 = 7;

#[derive(Clone, Copy, Debug)]
pub struct Normalizer {
    new_account_threshold: chrono::Duration,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(chrono::Duration::days(DEFAULT_NEW_ACCOUNT_THRESHOLD_DAYS))
    }
}

impl Normalizer {
    pub fn new(new_account_threshold: chrono::Duration) -> Self {
        Self {
            new_account_threshold,
        }
    }

    pub fn normalize(&self, raw: RawEvent) -> Option<Event> {
        self.normalize_at(raw, Utc::now())
    }

    pub fn normalize_at(&self, raw: RawEvent, now: DateTime<Utc>) -> Option<Event> {
        match raw {
            RawEvent::MessageCreated(m) => {
                let notable = m.content.chars().count() > NOTABLE_CONTENT_LEN
                    || m.attachments > 0
                    || m.embeds > 0;
                if !notable {
                    return None;
                }
                let payload = Payload::new()
                    .with(keys::CONTENT, m.content.clone())
                    .with(keys::ATTACHMENTS, m.attachments.to_string())
                    .with(keys::EMBEDS, m.embeds.to_string())
                    .with(keys::MESSAGE_ID, m.id.0.to_string());
                message_event(Category::MessageCreated, &m, m.created_at, payload)
            }
            RawEvent::MessageEdited { before, after } => {
                if before.as_ref().is_some_and(|b| b.content == after.content) {
                    return None;
                }
                let payload = Payload::new()
                    .with_opt(keys::CONTENT_BEFORE, before.map(|b| b.content))
                    .with(keys::CONTENT_AFTER, after.content.clone())
                    .with(keys::MESSAGE_ID, after.id.0.to_string());
                message_event(Category::MessageEdited, &after, now, payload)
            }
            RawEvent::MessageDeleted(m) => {
                let payload = Payload::new()
                    .with(keys::CONTENT, m.content.clone())
                    .with(keys::ATTACHMENTS, m.attachments.to_string())
                    .with(keys::CREATED_AT, format_datetime(&m.created_at))
                    .with(keys::MESSAGE_ID, m.id.0.to_string());
                message_event(Category::MessageDeleted, &m, now, payload)
            }
            RawEvent::MemberJoined {
                member,
                member_count,
            } => {
                let age = now.signed_duration_since(member.user.created_at);
                let payload = Payload::new()
                    .with(
                        keys::ACCOUNT_CREATED_AT,
                        format_datetime(&member.user.created_at),
                    )
                    .with(keys::ACCOUNT_AGE_DAYS, age.num_days().max(0).to_string())
                    .with(
                        keys::NEW_ACCOUNT,
                        (age < self.new_account_threshold).to_string(),
                    )
                    .with_opt(keys::MEMBER_COUNT, member_count.map(|n| n.to_string()));
                user_event(Category::MemberJoined, member.tenant_id, &member.user, now, payload)
            }
            RawEvent::MemberLeft {
                tenant_id,
                user,
                joined_at,
                member_count,
            } => {
                let payload = Payload::new()
                    .with_opt(keys::JOINED_AT, joined_at.as_ref().map(format_datetime))
                    .with_opt(
                        keys::TIME_IN_GUILD,
                        joined_at
                            .map(|j| format_duration(now.signed_duration_since(j).num_seconds())),
                    )
                    .with_opt(keys::MEMBER_COUNT, member_count.map(|n| n.to_string()));
                user_event(Category::MemberLeft, tenant_id, &user, now, payload)
            }
            RawEvent::MemberUpdated { before, after } => {
                let changes = member_changes(&before?, &after);
                if changes.is_empty() {
                    return None;
                }
                let payload = Payload::new().with(keys::CHANGES, changes.join("\n"));
                user_event(Category::MemberUpdated, after.tenant_id, &after.user, now, payload)
            }
            RawEvent::ChannelCreated(c) => {
                Some(channel_event(Category::ChannelCreated, &c, now, None))
            }
            RawEvent::ChannelDeleted(c) => {
                Some(channel_event(Category::ChannelDeleted, &c, now, None))
            }
            RawEvent::ChannelUpdated { before, after } => {
                let changes = channel_changes(&before?, &after);
                if changes.is_empty() {
                    return None;
                }
                Some(channel_event(
                    Category::ChannelUpdated,
                    &after,
                    now,
                    Some(changes.join("\n")),
                ))
            }
            RawEvent::RoleCreated(r) => {
                Some(role_event(Category::RoleCreated, &r, now, Payload::new()))
            }
            RawEvent::RoleDeleted(r) => {
                Some(role_event(Category::RoleDeleted, &r, now, Payload::new()))
            }
            RawEvent::RoleUpdated { before, after } => {
                let before = before?;
                let changes = role_changes(&before, &after);
                if changes.is_empty() {
                    return None;
                }
                let extra = Payload::new()
                    .with(keys::CHANGES, changes.join("\n"))
                    .with(
                        keys::PERMISSIONS_CHANGED,
                        (before.permissions != after.permissions).to_string(),
                    );
                Some(role_event(Category::RoleUpdated, &after, now, extra))
            }
            RawEvent::VoiceStateChanged {
                tenant_id,
                user,
                before,
                after,
                channel_members,
            } => {
                let tenant_id = tenant_id?;
                let (action, channel) = match (&before, &after) {
                    (None, Some(to)) => ("joined", to.clone()),
                    (Some(from), None) => ("left", from.clone()),
                    (Some(from), Some(to)) if from.id != to.id => ("moved", to.clone()),
                    // Mute/deafen/stream toggles.
                    _ => return None,
                };
                let payload = Payload::new()
                    .with(keys::VOICE_ACTION, action)
                    .with_opt(keys::VOICE_FROM, before.map(|c| c.id.mention()))
                    .with_opt(keys::VOICE_TO, after.map(|c| c.id.mention()))
                    .with_opt(keys::CHANNEL_MEMBERS, channel_members.map(|n| n.to_string()));
                let mut event =
                    user_event(Category::VoiceStateChanged, tenant_id, &user, now, payload)?;
                event.channel = Some(channel);
                Some(event)
            }
            RawEvent::ReactionAdded(r) => reaction_event(Category::ReactionAdded, r, now),
            RawEvent::ReactionRemoved(r) => reaction_event(Category::ReactionRemoved, r, now),
            RawEvent::GuildUpdated { before, after } => {
                let changes = guild_changes(&before?, &after);
                if changes.is_empty() {
                    return None;
                }
                Some(Event {
                    category: Category::GuildUpdated,
                    tenant_id: after.tenant_id,
                    subject_id: SubjectId(after.tenant_id.0),
                    occurred_at: now,
                    actor: None,
                    channel: None,
                    payload: Payload::new()
                        .with(keys::GUILD_NAME, after.name.clone())
                        .with(keys::CHANGES, changes.join("\n")),
                })
            }
            RawEvent::PresenceUpdated {
                tenant_id,
                user,
                before,
                after,
            } => {
                if before.as_deref() == Some(after.as_str()) {
                    return None;
                }
                let payload = Payload::new()
                    .with_opt(keys::STATUS_BEFORE, before)
                    .with(keys::STATUS_AFTER, after);
                user_event(Category::PresenceUpdated, tenant_id, &user, now, payload)
            }
        }
    }
}

fn actor(u: &UserSnapshot) -> Actor {
    Actor {
        id: u.id,
        name: u.name.clone(),
        discriminator: u.discriminator,
        avatar_url: u.avatar_url.clone(),
    }
}

/// `None` for bot accounts.
fn user_event(
    category: Category,
    tenant_id: TenantId,
    user: &UserSnapshot,
    occurred_at: DateTime<Utc>,
    payload: Payload,
) -> Option<Event> {
    if user.bot {
        return None;
    }
    Some(Event {
        category,
        tenant_id,
        subject_id: user.id.into(),
        occurred_at,
        actor: Some(actor(user)),
        channel: None,
        payload,
    })
}

/// `None` for bot authors and direct messages.
fn message_event(
    category: Category,
    m: &MessageSnapshot,
    occurred_at: DateTime<Utc>,
    payload: Payload,
) -> Option<Event> {
    let mut event = user_event(category, m.tenant_id?, &m.author, occurred_at, payload)?;
    event.channel = Some(m.channel.clone());
    Some(event)
}

fn reaction_event(category: Category, r: ReactionSnapshot, now: DateTime<Utc>) -> Option<Event> {
    if !r.message_author_bot && !NOTABLE_REACTIONS.contains(&r.emoji.as_str()) {
        return None;
    }
    let payload = Payload::new()
        .with(keys::EMOJI, r.emoji)
        .with_opt(keys::REACTION_COUNT, r.count.map(|n| n.to_string()))
        .with_opt(keys::CONTENT, r.message_content)
        .with(keys::MESSAGE_ID, r.message_id.0.to_string());
    let mut event = user_event(category, r.tenant_id?, &r.user, now, payload)?;
    event.channel = Some(r.channel);
    Some(event)
}

fn channel_event(
    category: Category,
    c: &ChannelSnapshot,
    now: DateTime<Utc>,
    changes: Option<String>,
) -> Event {
    Event {
        category,
        tenant_id: c.tenant_id,
        subject_id: SubjectId(c.id.0),
        occurred_at: now,
        actor: None,
        channel: Some(c.as_ref()),
        payload: Payload::new()
            .with(keys::CHANNEL_KIND, c.kind.clone())
            .with_opt(keys::CHANNEL_PARENT, c.parent_name.clone())
            .with(keys::POSITION, c.position.to_string())
            .with_opt(keys::CHANGES, changes),
    }
}

fn role_event(category: Category, r: &RoleSnapshot, now: DateTime<Utc>, extra: Payload) -> Event {
    let mut payload = extra
        .with(keys::ROLE_ID, r.id.0.to_string())
        .with(keys::ROLE_NAME, r.name.clone())
        .with(keys::ROLE_COLOR, format!("#{:06X}", r.color))
        .with(keys::POSITION, r.position.to_string())
        .with(keys::PERMISSION_COUNT, r.permissions.count_ones().to_string());
    if let Some(n) = r.member_count {
        payload = payload.with(keys::MEMBER_COUNT, n.to_string());
    }
    Event {
        category,
        tenant_id: r.tenant_id,
        subject_id: SubjectId(r.id.0),
        occurred_at: now,
        actor: None,
        channel: None,
        payload,
    }
}

// ============== Diffs ==============

fn change(out: &mut Vec<String>, label: &str, before: &str, after: &str) {
    if before != after {
        out.push(format!("**{label}:** {} → {}", or_none(before), or_none(after)));
    }
}

fn or_none(s: &str) -> &str {
    if s.is_empty() {
        "None"
    } else {
        s
    }
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "Yes"
    } else {
        "No"
    }
}

fn member_changes(before: &MemberSnapshot, after: &MemberSnapshot) -> Vec<String> {
    let mut out = Vec::new();
    change(
        &mut out,
        "Nickname",
        before.nickname.as_deref().unwrap_or_default(),
        after.nickname.as_deref().unwrap_or_default(),
    );

    let old: BTreeSet<&RoleRef> = before.roles.iter().collect();
    let new: BTreeSet<&RoleRef> = after.roles.iter().collect();
    let added: Vec<String> = new.difference(&old).map(|r| r.id.mention()).collect();
    let removed: Vec<String> = old.difference(&new).map(|r| r.id.mention()).collect();
    if !added.is_empty() {
        out.push(format!("**Roles added:** {}", added.join(", ")));
    }
    if !removed.is_empty() {
        out.push(format!("**Roles removed:** {}", removed.join(", ")));
    }

    if before.user.avatar_url != after.user.avatar_url {
        out.push("**Avatar:** changed".to_string());
    }
    out
}

fn channel_changes(before: &ChannelSnapshot, after: &ChannelSnapshot) -> Vec<String> {
    let mut out = Vec::new();
    change(&mut out, "Name", &before.name, &after.name);
    change(
        &mut out,
        "Topic",
        before.topic.as_deref().unwrap_or_default(),
        after.topic.as_deref().unwrap_or_default(),
    );
    change(&mut out, "NSFW", yes_no(before.nsfw), yes_no(after.nsfw));
    change(
        &mut out,
        "Slowmode",
        &format!("{}s", before.slowmode_secs),
        &format!("{}s", after.slowmode_secs),
    );
    change(
        &mut out,
        "Category",
        before.parent_name.as_deref().unwrap_or_default(),
        after.parent_name.as_deref().unwrap_or_default(),
    );
    out
}

fn role_changes(before: &RoleSnapshot, after: &RoleSnapshot) -> Vec<String> {
    let mut out = Vec::new();
    change(&mut out, "Name", &before.name, &after.name);
    change(
        &mut out,
        "Color",
        &format!("#{:06X}", before.color),
        &format!("#{:06X}", after.color),
    );
    if before.permissions != after.permissions {
        out.push(format!(
            "**Permissions:** {} → {}",
            before.permissions.count_ones(),
            after.permissions.count_ones()
        ));
    }
    change(&mut out, "Hoisted", yes_no(before.hoist), yes_no(after.hoist));
    change(
        &mut out,
        "Mentionable",
        yes_no(before.mentionable),
        yes_no(after.mentionable),
    );
    out
}

fn guild_changes(before: &GuildSnapshot, after: &GuildSnapshot) -> Vec<String> {
    let mut out = Vec::new();
    change(&mut out, "Name", &before.name, &after.name);
    change(
        &mut out,
        "Description",
        before.description.as_deref().unwrap_or_default(),
        after.description.as_deref().unwrap_or_default(),
    );
    if before.owner_id != after.owner_id {
        out.push(format!(
            "**Owner:** {} → {}",
            before.owner_id.mention(),
            after.owner_id.mention()
        ));
    }
    change(
        &mut out,
        "Verification level",
        &before.verification_level,
        &after.verification_level,
    );
    if before.icon_url != after.icon_url {
        out.push("**Icon:** changed".to_string());
    }
    out
}

/// Channel reference used where only an id is known.
pub fn bare_channel(id: ChannelId) -> ChannelRef {
    ChannelRef {
        id,
        name: id.to_string(),
        parent_name: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MessageId, RoleId, UserId};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn user(id: u64, bot: bool) -> UserSnapshot {
        UserSnapshot {
            id: UserId(id),
            name: format!("user{id}"),
            discriminator: None,
            avatar_url: None,
            bot,
            created_at: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn message(content: &str, author: UserSnapshot, tenant: Option<u64>) -> MessageSnapshot {
        MessageSnapshot {
            id: MessageId(1),
            tenant_id: tenant.map(TenantId),
            channel: bare_channel(ChannelId(10)),
            author,
            content: content.to_string(),
            attachments: 0,
            embeds: 0,
            created_at: now(),
        }
    }

    fn member(roles: &[u64], nick: Option<&str>) -> MemberSnapshot {
        MemberSnapshot {
            tenant_id: TenantId(1),
            user: user(5, false),
            nickname: nick.map(str::to_string),
            roles: roles
                .iter()
                .map(|id| RoleRef {
                    id: RoleId(*id),
                    name: format!("r{id}"),
                })
                .collect(),
            joined_at: None,
        }
    }

    fn role(permissions: u64, name: &str) -> RoleSnapshot {
        RoleSnapshot {
            tenant_id: TenantId(1),
            id: RoleId(300),
            name: name.to_string(),
            color: 0x3498DB,
            position: 2,
            permissions,
            hoist: false,
            mentionable: false,
            member_count: Some(4),
        }
    }

    fn n() -> Normalizer {
        Normalizer::default()
    }

    #[test]
    fn bot_messages_are_dropped() {
        let raw =
            RawEvent::MessageCreated(message("a long enough message", user(1, true), Some(1)));
        assert!(n().normalize_at(raw, now()).is_none());
    }

    #[test]
    fn direct_messages_are_dropped() {
        let raw = RawEvent::MessageCreated(message("a long enough message", user(1, false), None));
        assert!(n().normalize_at(raw, now()).is_none());
    }

    #[test]
    fn short_messages_need_an_attachment() {
        let raw = RawEvent::MessageCreated(message("hi", user(1, false), Some(1)));
        assert!(n().normalize_at(raw, now()).is_none());

        let mut m = message("hi", user(1, false), Some(1));
        m.attachments = 1;
        let e = n().normalize_at(RawEvent::MessageCreated(m), now()).unwrap();
        assert_eq!(e.category, Category::MessageCreated);
        assert_eq!(e.subject_id, SubjectId(1));
        assert_eq!(e.tenant_id, TenantId(1));
        assert_eq!(e.payload.get(keys::ATTACHMENTS), Some("1"));
        assert_eq!(e.channel.unwrap().id, ChannelId(10));
    }

    #[test]
    fn edits_keep_both_versions_and_skip_unchanged_content() {
        let before = message("original text", user(1, false), Some(1));
        let after = message("edited text!!", user(1, false), Some(1));
        let e = n()
            .normalize_at(
                RawEvent::MessageEdited {
                    before: Some(before.clone()),
                    after,
                },
                now(),
            )
            .unwrap();
        assert_eq!(e.payload.get(keys::CONTENT_BEFORE), Some("original text"));
        assert_eq!(e.payload.get(keys::CONTENT_AFTER), Some("edited text!!"));

        let unchanged = RawEvent::MessageEdited {
            before: Some(before.clone()),
            after: before,
        };
        assert!(n().normalize_at(unchanged, now()).is_none());
    }

    #[test]
    fn young_accounts_are_flagged_on_join() {
        let mut m = member(&[], None);
        m.user.created_at = now() - chrono::Duration::days(2);
        let e = n()
            .normalize_at(
                RawEvent::MemberJoined {
                    member: m,
                    member_count: Some(42),
                },
                now(),
            )
            .unwrap();
        assert!(e.payload.flag(keys::NEW_ACCOUNT));
        assert_eq!(e.payload.get(keys::ACCOUNT_AGE_DAYS), Some("2"));
        assert_eq!(e.payload.get(keys::MEMBER_COUNT), Some("42"));

        let old = member(&[], None);
        let e = n()
            .normalize_at(
                RawEvent::MemberJoined {
                    member: old,
                    member_count: None,
                },
                now(),
            )
            .unwrap();
        assert!(!e.payload.flag(keys::NEW_ACCOUNT));
    }

    #[test]
    fn member_left_reports_time_in_server() {
        let e = n()
            .normalize_at(
                RawEvent::MemberLeft {
                    tenant_id: TenantId(1),
                    user: user(5, false),
                    joined_at: Some(now() - chrono::Duration::seconds(90)),
                    member_count: None,
                },
                now(),
            )
            .unwrap();
        assert_eq!(e.payload.get(keys::TIME_IN_GUILD), Some("1m 30s"));
        assert_eq!(e.payload.get(keys::MEMBER_COUNT), None);
    }

    #[test]
    fn member_role_diff_is_computed_by_set_difference() {
        let raw = RawEvent::MemberUpdated {
            before: Some(member(&[1, 2], Some("old"))),
            after: member(&[2, 3], Some("new")),
        };
        let e = n().normalize_at(raw, now()).unwrap();
        let changes = e.payload.get(keys::CHANGES).unwrap();
        assert!(changes.contains("**Nickname:** old → new"));
        assert!(changes.contains("**Roles added:** <@&3>"));
        assert!(changes.contains("**Roles removed:** <@&1>"));
    }

    #[test]
    fn member_update_without_difference_is_dropped() {
        let raw = RawEvent::MemberUpdated {
            before: Some(member(&[1], None)),
            after: member(&[1], None),
        };
        assert!(n().normalize_at(raw, now()).is_none());

        let unknown_before = RawEvent::MemberUpdated {
            before: None,
            after: member(&[1], None),
        };
        assert!(n().normalize_at(unknown_before, now()).is_none());
    }

    #[test]
    fn voice_transitions() {
        let voice = |before: Option<u64>, after: Option<u64>| RawEvent::VoiceStateChanged {
            tenant_id: Some(TenantId(1)),
            user: user(5, false),
            before: before.map(|id| bare_channel(ChannelId(id))),
            after: after.map(|id| bare_channel(ChannelId(id))),
            channel_members: Some(3),
        };

        let joined = n().normalize_at(voice(None, Some(20)), now()).unwrap();
        assert_eq!(joined.payload.get(keys::VOICE_ACTION), Some("joined"));
        assert_eq!(joined.channel.unwrap().id, ChannelId(20));

        let left = n().normalize_at(voice(Some(20), None), now()).unwrap();
        assert_eq!(left.payload.get(keys::VOICE_ACTION), Some("left"));

        let moved = n().normalize_at(voice(Some(20), Some(21)), now()).unwrap();
        assert_eq!(moved.payload.get(keys::VOICE_ACTION), Some("moved"));
        assert_eq!(moved.payload.get(keys::VOICE_FROM), Some("<#20>"));
        assert_eq!(moved.payload.get(keys::VOICE_TO), Some("<#21>"));

        assert!(n().normalize_at(voice(Some(20), Some(20)), now()).is_none());
    }

    #[test]
    fn role_events_use_the_role_as_subject() {
        let e = n()
            .normalize_at(RawEvent::RoleCreated(role(0b1011, "Mods")), now())
            .unwrap();
        assert_eq!(e.subject_id, SubjectId(300));
        assert_eq!(e.payload.get(keys::PERMISSION_COUNT), Some("3"));
        assert_eq!(e.payload.get(keys::ROLE_COLOR), Some("#3498DB"));
        assert!(e.actor.is_none());
    }

    #[test]
    fn role_permission_changes_are_marked() {
        let raw = RawEvent::RoleUpdated {
            before: Some(role(0b1, "Mods")),
            after: role(0b111, "Mods"),
        };
        let e = n().normalize_at(raw, now()).unwrap();
        assert!(e.payload.flag(keys::PERMISSIONS_CHANGED));
        assert_eq!(e.payload.get(keys::CHANGES), Some("**Permissions:** 1 → 3"));

        let renamed = RawEvent::RoleUpdated {
            before: Some(role(0b1, "Mods")),
            after: role(0b1, "Moderators"),
        };
        let e = n().normalize_at(renamed, now()).unwrap();
        assert!(!e.payload.flag(keys::PERMISSIONS_CHANGED));
    }

    #[test]
    fn presence_needs_a_status_change() {
        let raw = |before: Option<&str>, after: &str| RawEvent::PresenceUpdated {
            tenant_id: TenantId(1),
            user: user(5, false),
            before: before.map(str::to_string),
            after: after.to_string(),
        };
        assert!(n().normalize_at(raw(Some("online"), "online"), now()).is_none());
        let e = n().normalize_at(raw(Some("online"), "idle"), now()).unwrap();
        assert_eq!(e.payload.get(keys::STATUS_AFTER), Some("idle"));
    }

    fn reaction(emoji: &str, message_author_bot: bool, count: Option<u64>) -> ReactionSnapshot {
        ReactionSnapshot {
            tenant_id: Some(TenantId(1)),
            user: user(5, false),
            channel: bare_channel(ChannelId(10)),
            message_id: MessageId(77),
            emoji: emoji.to_string(),
            count,
            message_content: Some("release notes".to_string()),
            message_author_bot,
        }
    }

    #[test]
    fn reactions_on_member_messages_need_a_notable_emoji() {
        let raw = RawEvent::ReactionAdded(reaction("🐸", false, Some(1)));
        assert!(n().normalize_at(raw, now()).is_none());

        for emoji in ["❤️", "👍", "👎", "🔥", "💯"] {
            let raw = RawEvent::ReactionAdded(reaction(emoji, false, Some(1)));
            assert!(n().normalize_at(raw, now()).is_some(), "{emoji} should be reported");
        }

        let removed = RawEvent::ReactionRemoved(reaction("🐸", false, None));
        assert!(n().normalize_at(removed, now()).is_none());
    }

    #[test]
    fn any_reaction_on_a_bot_message_is_reported() {
        let raw = RawEvent::ReactionAdded(reaction("🐸", true, Some(3)));
        let e = n().normalize_at(raw, now()).unwrap();
        assert_eq!(e.category, Category::ReactionAdded);
        assert_eq!(e.subject_id, SubjectId(5));
        assert_eq!(e.payload.get(keys::EMOJI), Some("🐸"));
        assert_eq!(e.payload.get(keys::REACTION_COUNT), Some("3"));
        assert_eq!(e.payload.get(keys::CONTENT), Some("release notes"));
    }

    #[test]
    fn unknown_reaction_count_is_left_out() {
        let raw = RawEvent::ReactionAdded(reaction("👍", false, None));
        let e = n().normalize_at(raw, now()).unwrap();
        assert_eq!(e.payload.get(keys::REACTION_COUNT), None);
    }
}
