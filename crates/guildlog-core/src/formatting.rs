//! Event → notification card rendering, with the platform's embed size limits.

use chrono::{DateTime, Utc};

use crate::{
    event::{keys, Category, Event},
    tenant::TenantConfig,
};

// ============== Platform limits ==============

pub const MAX_TITLE_LEN: usize = 256;
pub const MAX_DESCRIPTION_LEN: usize = 4096;
pub const MAX_FIELDS: usize = 25;
pub const MAX_FIELD_NAME_LEN: usize = 256;
pub const MAX_FIELD_VALUE_LEN: usize = 1024;
pub const MAX_FOOTER_LEN: usize = 2048;

pub const ELLIPSIS: &str = "...";

/// Message bodies are previewed, not reproduced.
const CONTENT_PREVIEW_LEN: usize = 1000;
const REACTION_PREVIEW_LEN: usize = 200;

const NONE: &str = "None";
const NO_CONTENT: &str = "No content";
const UNKNOWN: &str = "Unknown";

// ============== Colors ==============

pub mod colors {
    pub const GREEN: u32 = 0x2E_CC_71;
    pub const RED: u32 = 0xE7_4C_3C;
    pub const ORANGE: u32 = 0xE6_7E_22;
    pub const BLUE: u32 = 0x34_98_DB;
    pub const YELLOW: u32 = 0xFE_E7_5C;
    pub const GOLD: u32 = 0xF1_C4_0F;
}

// ============== Notification ==============

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// A size-bounded notification card. Built per delivery, never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<Field>,
    pub thumbnail_url: Option<String>,
    pub footer: String,
    pub timestamp: DateTime<Utc>,
}

/// Builder that applies every limit as parts are added.
#[derive(Clone, Debug)]
pub struct NotificationBuilder {
    title: String,
    description: String,
    color: u32,
    fields: Vec<Field>,
    thumbnail_url: Option<String>,
    footer: Option<String>,
    timestamp: DateTime<Utc>,
}

impl NotificationBuilder {
    pub fn new(title: impl AsRef<str>, color: u32, timestamp: DateTime<Utc>) -> Self {
        Self {
            title: truncate(title.as_ref(), MAX_TITLE_LEN),
            description: String::new(),
            color,
            fields: Vec::new(),
            thumbnail_url: None,
            footer: None,
            timestamp,
        }
    }

    pub fn description(mut self, text: impl AsRef<str>) -> Self {
        self.description = truncate(text.as_ref(), MAX_DESCRIPTION_LEN);
        self
    }

    /// Empty values render as the `None` placeholder; extra fields beyond the limit are dropped.
    pub fn field(mut self, name: impl AsRef<str>, value: impl AsRef<str>, inline: bool) -> Self {
        if self.fields.len() >= MAX_FIELDS {
            return self;
        }
        let value = value.as_ref();
        let value = if value.trim().is_empty() { NONE } else { value };
        self.fields.push(Field {
            name: truncate(name.as_ref(), MAX_FIELD_NAME_LEN),
            value: truncate(value, MAX_FIELD_VALUE_LEN),
            inline,
        });
        self
    }

    pub fn thumbnail(mut self, url: Option<String>) -> Self {
        self.thumbnail_url = url.filter(|u| !u.is_empty());
        self
    }

    pub fn footer(mut self, text: impl AsRef<str>) -> Self {
        self.footer = Some(truncate(text.as_ref(), MAX_FOOTER_LEN));
        self
    }

    pub fn footer_opt(self, text: Option<&str>) -> Self {
        match text {
            Some(t) => self.footer(t),
            None => self,
        }
    }

    /// `default_footer` is used only when no footer was set explicitly.
    pub fn build(self, default_footer: impl FnOnce() -> String) -> Notification {
        let footer = self
            .footer
            .unwrap_or_else(|| truncate(&default_footer(), MAX_FOOTER_LEN));
        Notification {
            title: self.title,
            description: self.description,
            color: self.color,
            fields: self.fields,
            thumbnail_url: self.thumbnail_url,
            footer,
            timestamp: self.timestamp,
        }
    }
}

/// Cap `text` at `max` characters, replacing the tail with `...` when cut.
///
/// Counts Unicode scalar values, so a multi-byte character is never split.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Shorter preview without the ellipsis marker (body snippets inside a field).
fn preview(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// `Server: <id> | ID: <unix ts>`.
pub fn default_footer(event: &Event) -> String {
    format!(
        "Server: {} | ID: {}",
        event.tenant_id,
        event.occurred_at.timestamp()
    )
}

pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%d.%m.%Y %H:%M:%S").to_string()
}

/// `3d 4h 5m` style span used for "time in server".
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if days > 0 {
        return format!("{days}d {hours}h {mins}m");
    }
    if hours > 0 {
        return format!("{hours}h {mins}m {secs}s");
    }
    if mins > 0 {
        return format!("{mins}m {secs}s");
    }
    format!("{secs}s")
}

// ============== Formatter ==============

/// Pure transformation from a canonical event to a notification card.
#[derive(Clone, Copy, Debug, Default)]
pub struct Formatter;

impl Formatter {
    pub fn new() -> Self {
        Self
    }

    pub fn format(&self, event: &Event, _tenant: &TenantConfig) -> Notification {
        let p = &event.payload;
        let get = |k: &str| p.get(k).unwrap_or(UNKNOWN).to_string();
        let count_or_none = |k: &str, unit: &str| match p.get(k) {
            Some(n) if n != "0" => format!("{n} {unit}"),
            _ => NONE.to_string(),
        };

        let (title, color) = title_and_color(event);
        let mut b = NotificationBuilder::new(title, color, event.occurred_at)
            .description(describe(event))
            .thumbnail(event.actor.as_ref().and_then(|a| a.avatar_url.clone()));

        match event.category {
            Category::MessageCreated => {
                b = b
                    .field("Content", content_or_placeholder(p.get(keys::CONTENT)), false)
                    .field("Attachments", count_or_none(keys::ATTACHMENTS, "file(s)"), true)
                    .field("Embeds", count_or_none(keys::EMBEDS, "embed(s)"), true);
            }
            Category::MessageEdited => {
                b = b
                    .field("Before", content_or_placeholder(p.get(keys::CONTENT_BEFORE)), false)
                    .field("After", content_or_placeholder(p.get(keys::CONTENT_AFTER)), false)
                    .field("Edited at", format_datetime(&event.occurred_at), true);
            }
            Category::MessageDeleted => {
                b = b
                    .field("Content", content_or_placeholder(p.get(keys::CONTENT)), false)
                    .field("Attachments", count_or_none(keys::ATTACHMENTS, "file(s)"), true)
                    .field("Created at", get(keys::CREATED_AT), true);
            }
            Category::MemberJoined => {
                let new_account = p.flag(keys::NEW_ACCOUNT);
                b = b
                    .field("Account created", get(keys::ACCOUNT_CREATED_AT), true)
                    .field(
                        "Account age",
                        p.get(keys::ACCOUNT_AGE_DAYS)
                            .map(|d| format!("{d} days"))
                            .unwrap_or_else(|| UNKNOWN.to_string()),
                        true,
                    )
                    .field("Member count", get(keys::MEMBER_COUNT), true)
                    .field("New account", if new_account { "⚠️ Yes" } else { "No" }, true)
                    .footer_opt(new_account.then_some("⚠️ New account"));
            }
            Category::MemberLeft => {
                b = b
                    .field("Member since", get(keys::JOINED_AT), true)
                    .field("Time in server", get(keys::TIME_IN_GUILD), true)
                    .field("Member count", get(keys::MEMBER_COUNT), true);
            }
            Category::MemberUpdated
            | Category::ChannelUpdated
            | Category::RoleUpdated
            | Category::GuildUpdated => {
                b = b.field("Changed at", format_datetime(&event.occurred_at), true);
            }
            Category::ChannelCreated | Category::ChannelDeleted => {
                b = b
                    .field("Category", p.get(keys::CHANNEL_PARENT).unwrap_or(NONE), true)
                    .field("Position", get(keys::POSITION), true);
            }
            Category::RoleCreated | Category::RoleDeleted => {
                let members_label = if event.category == Category::RoleDeleted {
                    "Members before"
                } else {
                    "Members"
                };
                b = b
                    .field("Color", get(keys::ROLE_COLOR), true)
                    .field("Position", get(keys::POSITION), true)
                    .field(
                        "Permissions",
                        p.get(keys::PERMISSION_COUNT)
                            .map(|n| format!("{n} permissions"))
                            .unwrap_or_else(|| UNKNOWN.to_string()),
                        true,
                    )
                    .field(members_label, get(keys::MEMBER_COUNT), true);
            }
            Category::VoiceStateChanged => {
                if p.get(keys::VOICE_ACTION) == Some("moved") {
                    b = b
                        .field("From", get(keys::VOICE_FROM), true)
                        .field("To", get(keys::VOICE_TO), true)
                        .field("Members in new channel", get(keys::CHANNEL_MEMBERS), true);
                } else {
                    b = b.field("Members in channel", get(keys::CHANNEL_MEMBERS), true);
                }
            }
            Category::ReactionAdded | Category::ReactionRemoved => {
                let message = p
                    .get(keys::CONTENT)
                    .filter(|c| !c.trim().is_empty())
                    .map(|c| preview(c, REACTION_PREVIEW_LEN))
                    .unwrap_or_else(|| NO_CONTENT.to_string());
                b = b.field("Reaction", get(keys::EMOJI), true);
                if let Some(count) = p.get(keys::REACTION_COUNT) {
                    b = b.field("Count", count, true);
                }
                b = b.field("Message", message, false);
            }
            Category::PresenceUpdated => {
                b = b
                    .field("Before", get(keys::STATUS_BEFORE), true)
                    .field("After", get(keys::STATUS_AFTER), true);
            }
        }

        b.build(|| default_footer(event))
    }
}

fn content_or_placeholder(content: Option<&str>) -> String {
    match content {
        Some(c) if !c.trim().is_empty() => preview(c, CONTENT_PREVIEW_LEN),
        _ => NO_CONTENT.to_string(),
    }
}

fn title_and_color(event: &Event) -> (&'static str, u32) {
    let p = &event.payload;
    match event.category {
        Category::MessageCreated => ("📝 New message", colors::GREEN),
        Category::MessageEdited => ("✏️ Message edited", colors::ORANGE),
        Category::MessageDeleted => ("🗑️ Message deleted", colors::RED),
        Category::MemberJoined if p.flag(keys::NEW_ACCOUNT) => ("👋 Member joined", colors::ORANGE),
        Category::MemberJoined => ("👋 Member joined", colors::GREEN),
        Category::MemberLeft => ("👋 Member left", colors::RED),
        Category::MemberUpdated => ("👤 Member updated", colors::BLUE),
        Category::ChannelCreated => ("📁 Channel created", colors::GREEN),
        Category::ChannelDeleted => ("🗑️ Channel deleted", colors::RED),
        Category::ChannelUpdated => ("🔧 Channel updated", colors::BLUE),
        Category::RoleCreated => ("🎭 Role created", colors::GREEN),
        Category::RoleDeleted => ("🗑️ Role deleted", colors::RED),
        Category::RoleUpdated if p.flag(keys::PERMISSIONS_CHANGED) => {
            ("🎭 Role updated", colors::ORANGE)
        }
        Category::RoleUpdated => ("🎭 Role updated", colors::BLUE),
        Category::VoiceStateChanged => match p.get(keys::VOICE_ACTION) {
            Some("joined") => ("🎤 Joined voice channel", colors::GREEN),
            Some("left") => ("🎤 Left voice channel", colors::RED),
            _ => ("🎤 Moved to another voice channel", colors::BLUE),
        },
        Category::ReactionAdded => ("😀 Reaction added", colors::YELLOW),
        Category::ReactionRemoved => ("😶 Reaction removed", colors::YELLOW),
        Category::GuildUpdated => ("🏠 Server updated", colors::BLUE),
        Category::PresenceUpdated => ("🟢 Status changed", colors::BLUE),
    }
}

fn describe(event: &Event) -> String {
    let p = &event.payload;
    let actor = event
        .actor
        .as_ref()
        .map(|a| a.reference())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let mut lines = vec![format!("**User:** {actor}")];

    match event.category {
        Category::ChannelCreated | Category::ChannelDeleted | Category::ChannelUpdated => {
            lines.push(format!("**Type:** {}", p.get(keys::CHANNEL_KIND).unwrap_or(UNKNOWN)));
        }
        Category::RoleCreated | Category::RoleDeleted | Category::RoleUpdated => {
            let role = match (p.get(keys::ROLE_ID), p.get(keys::ROLE_NAME)) {
                (Some(id), Some(name)) if event.category == Category::RoleDeleted => {
                    format!("{name} (`{id}`)")
                }
                (Some(id), _) => format!("<@&{id}> (`{id}`)"),
                (None, Some(name)) => name.to_string(),
                (None, None) => UNKNOWN.to_string(),
            };
            lines.push(format!("**Role:** {role}"));
        }
        Category::GuildUpdated => {
            lines.push(format!("**Server:** {}", p.get(keys::GUILD_NAME).unwrap_or(UNKNOWN)));
        }
        _ => {}
    }

    if let Some(channel) = &event.channel {
        // A deleted channel can no longer be mentioned.
        let reference = if event.category == Category::ChannelDeleted {
            format!("#{} (`{}`)", channel.name, channel.id)
        } else {
            channel.reference()
        };
        lines.push(format!("**Channel:** {reference}"));
    }

    if let Some(changes) = p.get(keys::CHANGES) {
        lines.push(changes.to_string());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::TenantDefaults,
        domain::{ChannelId, SubjectId, TenantId, UserId},
        event::{Actor, ChannelRef, Payload},
    };
    use chrono::TimeZone;

    fn tenant() -> TenantConfig {
        TenantConfig::with_defaults(TenantId(77), &TenantDefaults::default())
    }

    fn event(category: Category, payload: Payload) -> Event {
        Event {
            category,
            tenant_id: TenantId(77),
            subject_id: SubjectId(5),
            occurred_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            actor: Some(Actor {
                id: UserId(5),
                name: "bob".to_string(),
                discriminator: None,
                avatar_url: Some("https://cdn.example/a.png".to_string()),
            }),
            channel: Some(ChannelRef {
                id: ChannelId(900),
                name: "general".to_string(),
                parent_name: Some("Text".to_string()),
            }),
            payload,
        }
    }

    #[test]
    fn truncates_1025_chars_to_1024_with_ellipsis() {
        let v = "x".repeat(1025);
        let out = truncate(&v, MAX_FIELD_VALUE_LEN);
        assert_eq!(out.chars().count(), 1024);
        assert!(out.ends_with("..."));
        assert_eq!(&out[..1021], &v[..1021]);
    }

    #[test]
    fn values_at_the_limit_are_untouched() {
        let v = "y".repeat(1024);
        assert_eq!(truncate(&v, MAX_FIELD_VALUE_LEN), v);
    }

    #[test]
    fn truncation_never_splits_characters() {
        let v = "é".repeat(2000);
        let out = truncate(&v, MAX_FIELD_VALUE_LEN);
        assert_eq!(out.chars().count(), 1024);
        assert!(out.starts_with(&"é".repeat(1021)));
    }

    #[test]
    fn field_values_are_capped_through_the_builder() {
        let n = NotificationBuilder::new("t", colors::BLUE, Utc::now())
            .field("big", "z".repeat(5000), false)
            .build(|| "f".to_string());
        assert_eq!(n.fields[0].value.chars().count(), 1024);
        assert!(n.fields[0].value.ends_with(ELLIPSIS));
    }

    #[test]
    fn builder_caps_field_count_and_fills_empty_values() {
        let mut b = NotificationBuilder::new("t", colors::BLUE, Utc::now());
        for i in 0..40 {
            b = b.field(format!("f{i}"), "", true);
        }
        let n = b.build(|| "f".to_string());
        assert_eq!(n.fields.len(), MAX_FIELDS);
        assert!(n.fields.iter().all(|f| f.value == "None"));
    }

    #[test]
    fn message_created_card() {
        let p = Payload::new()
            .with(keys::CONTENT, "hello there, everyone")
            .with(keys::ATTACHMENTS, "2")
            .with(keys::EMBEDS, "0");
        let n = Formatter::new().format(&event(Category::MessageCreated, p), &tenant());

        assert_eq!(n.title, "📝 New message");
        assert_eq!(n.color, colors::GREEN);
        assert!(n.description.contains("<@5> (`5`)"));
        assert!(n.description.contains("**Channel:** <#900> (`900`) in Text"));
        assert_eq!(n.fields[0].value, "hello there, everyone");
        assert_eq!(n.fields[1].value, "2 file(s)");
        assert_eq!(n.fields[2].value, "None");
        assert_eq!(n.thumbnail_url.as_deref(), Some("https://cdn.example/a.png"));
        assert_eq!(n.footer, format!("Server: 77 | ID: {}", n.timestamp.timestamp()));
    }

    #[test]
    fn missing_payload_renders_placeholders() {
        let n = Formatter::new().format(&event(Category::MessageEdited, Payload::new()), &tenant());
        assert_eq!(n.fields[0].value, "No content");
        assert_eq!(n.fields[1].value, "No content");

        let n = Formatter::new().format(&event(Category::MemberLeft, Payload::new()), &tenant());
        assert!(n.fields.iter().all(|f| f.value == "Unknown"));
    }

    #[test]
    fn missing_actor_renders_placeholder() {
        let mut e = event(Category::ChannelCreated, Payload::new());
        e.actor = None;
        let n = Formatter::new().format(&e, &tenant());
        assert!(n.description.starts_with("**User:** Unknown"));
        assert_eq!(n.thumbnail_url, None);
    }

    #[test]
    fn new_account_join_is_flagged() {
        let p = Payload::new()
            .with(keys::NEW_ACCOUNT, "true")
            .with(keys::ACCOUNT_AGE_DAYS, "2");
        let n = Formatter::new().format(&event(Category::MemberJoined, p), &tenant());
        assert_eq!(n.color, colors::ORANGE);
        assert_eq!(n.footer, "⚠️ New account");
        assert_eq!(n.fields[1].value, "2 days");
    }

    #[test]
    fn voice_actions_pick_title_and_color() {
        let joined = Payload::new().with(keys::VOICE_ACTION, "joined");
        let n = Formatter::new().format(&event(Category::VoiceStateChanged, joined), &tenant());
        assert_eq!(n.color, colors::GREEN);

        let moved = Payload::new()
            .with(keys::VOICE_ACTION, "moved")
            .with(keys::VOICE_FROM, "<#1>")
            .with(keys::VOICE_TO, "<#2>");
        let n = Formatter::new().format(&event(Category::VoiceStateChanged, moved), &tenant());
        assert_eq!(n.color, colors::BLUE);
        assert_eq!(n.fields[0].value, "<#1>");
        assert_eq!(n.fields[1].value, "<#2>");
    }

    #[test]
    fn permission_changes_make_role_update_orange() {
        let p = Payload::new()
            .with(keys::PERMISSIONS_CHANGED, "true")
            .with(keys::CHANGES, "**Permissions:** 3 → 9");
        let n = Formatter::new().format(&event(Category::RoleUpdated, p), &tenant());
        assert_eq!(n.color, colors::ORANGE);
        assert!(n.description.ends_with("**Permissions:** 3 → 9"));
    }

    #[test]
    fn long_message_content_is_previewed() {
        let p = Payload::new().with(keys::CONTENT, "a".repeat(3000));
        let n = Formatter::new().format(&event(Category::MessageDeleted, p), &tenant());
        assert_eq!(n.fields[0].value.chars().count(), 1000);
    }

    #[test]
    fn reaction_cards_show_the_count_when_known() {
        let p = Payload::new()
            .with(keys::EMOJI, "🔥")
            .with(keys::REACTION_COUNT, "4")
            .with(keys::CONTENT, "ship it");
        let n = Formatter::new().format(&event(Category::ReactionAdded, p), &tenant());
        assert_eq!(n.color, colors::YELLOW);
        let names: Vec<_> = n.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["Reaction", "Count", "Message"]);
        assert_eq!(n.fields[1].value, "4");
        assert!(n.fields[1].inline);

        let unknown = Payload::new().with(keys::EMOJI, "🔥");
        let n = Formatter::new().format(&event(Category::ReactionRemoved, unknown), &tenant());
        assert!(n.fields.iter().all(|f| f.name != "Count"));
    }

    #[test]
    fn durations_are_compact() {
        assert_eq!(format_duration(5), "5s");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(3 * 3600 + 60), "3h 1m 0s");
        assert_eq!(format_duration(2 * 86_400 + 3600), "2d 1h 0m");
        assert_eq!(format_duration(-4), "0s");
    }
}
