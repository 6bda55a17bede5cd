//! serenity event handler: gateway callbacks → pipeline runs.
//!
//! serenity dispatches every callback on its own task, so one slow tenant never
//! holds up another.

use std::sync::Arc;

use serenity::{
    all::{
        ChannelId, Context, EventHandler, GatewayIntents, Guild, GuildChannel, GuildId,
        GuildMemberUpdateEvent, Member, Message, MessageId, MessageUpdateEvent, PartialGuild,
        Presence, Reaction, Ready, Role, RoleId, UnavailableGuild, User, VoiceState,
    },
    async_trait,
};
use tracing::{debug, info, warn};

use guildlog_core::{
    admin::{self, AdminCommand, Invocation, Reply},
    domain,
    event::Actor,
    pipeline::{Pipeline, PipelineOutcome},
    platform::types::{RawEvent, ReactionSnapshot, UserSnapshot},
};

use crate::{convert, embed_message, tracker::MessageTracker};

const NOT_ADMIN: &str = "❌ You need the Administrator permission to use this command";

pub struct GuildLogHandler {
    pipeline: Pipeline,
    tracker: Arc<MessageTracker>,
}

impl GuildLogHandler {
    pub fn new(pipeline: Pipeline, tracker: Arc<MessageTracker>) -> Self {
        Self { pipeline, tracker }
    }

    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MEMBERS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
            | GatewayIntents::GUILD_VOICE_STATES
            | GatewayIntents::GUILD_MESSAGE_REACTIONS
            | GatewayIntents::GUILD_PRESENCES
    }

    async fn run(&self, raw: RawEvent) {
        let tenant = raw.tenant_id();
        match self.pipeline.handle(raw).await {
            PipelineOutcome::Dispatched(result) => {
                debug!(tenant_id = ?tenant, result = %result, "Event dispatched");
            }
            outcome => {
                debug!(tenant_id = ?tenant, outcome = ?outcome, "Event not dispatched");
            }
        }
    }

    /// Returns `true` when the message was an admin command (and was handled).
    async fn try_command(&self, ctx: &Context, msg: &Message, guild_id: GuildId) -> bool {
        let tenant_id = convert::tenant(guild_id);
        let prefix = self.pipeline.store.command_prefix(tenant_id);
        let Some(cmd) = AdminCommand::parse(&prefix, &msg.content) else {
            return false;
        };

        if !is_administrator(ctx, msg, guild_id).await {
            reply_text(ctx, msg.channel_id, NOT_ADMIN).await;
            return true;
        }

        info!(tenant_id = %tenant_id, user_id = %msg.author.id, command = ?cmd, "Admin command");
        let inv = Invocation {
            tenant_id,
            channel_id: domain::ChannelId(msg.channel_id.get()),
            invoker: actor(&convert::user(&msg.author)),
        };
        match admin::execute(&self.pipeline, &inv, cmd).await {
            Reply::Text(text) => reply_text(ctx, msg.channel_id, &text).await,
            Reply::Card(card) => {
                if let Err(e) = msg.channel_id.send_message(&ctx.http, embed_message(&card)).await {
                    warn!(channel_id = %msg.channel_id, error = %e, "Failed to send reply card");
                }
            }
        }
        true
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

async fn reply_text(ctx: &Context, channel_id: ChannelId, text: &str) {
    if let Err(e) = channel_id.say(&ctx.http, text).await {
        warn!(channel_id = %channel_id, error = %e, "Failed to send reply");
    }
}

async fn is_administrator(ctx: &Context, msg: &Message, guild_id: GuildId) -> bool {
    let member = match msg.member(ctx).await {
        Ok(m) => m,
        Err(e) => {
            debug!(user_id = %msg.author.id, error = %e, "Member lookup failed");
            return false;
        }
    };
    member_is_admin(ctx, guild_id, &member)
}

#[allow(deprecated)]
fn member_is_admin(ctx: &Context, guild_id: GuildId, member: &Member) -> bool {
    ctx.cache
        .guild(guild_id)
        .map(|g| g.member_permissions(member).administrator())
        .unwrap_or(false)
}

#[async_trait]
impl EventHandler for GuildLogHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            bot_user = %ready.user.name,
            guilds = ready.guilds.len(),
            tenants = self.pipeline.store.tenants().len(),
            "Connected to Discord"
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Direct messages are neither logged nor accepted as commands.
        let Some(guild_id) = msg.guild_id else {
            return;
        };
        if msg.author.bot {
            return;
        }
        if self.try_command(&ctx, &msg, guild_id).await {
            return;
        }
        let prefix = self.pipeline.store.command_prefix(convert::tenant(guild_id));
        if admin::is_command_text(&prefix, &msg.content) {
            debug!(message_id = %msg.id, "Prefixed message not logged");
            return;
        }

        let snapshot = convert::message(&ctx.cache, &msg);
        self.tracker.record(snapshot.clone());
        self.run(RawEvent::MessageCreated(snapshot)).await;
    }

    async fn message_update(
        &self,
        ctx: Context,
        old_if_available: Option<Message>,
        new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        // Embed unfurls arrive as updates without content.
        let Some(content) = event.content.clone() else {
            return;
        };
        let id = domain::MessageId(event.id.get());

        let before = self
            .tracker
            .update_content(id, &content)
            .or_else(|| old_if_available.as_ref().map(|m| convert::message(&ctx.cache, m)));

        let after = match (new.as_ref(), before.as_ref()) {
            (Some(m), _) => convert::message(&ctx.cache, m),
            (None, Some(b)) => {
                let mut a = b.clone();
                a.content = content;
                if let Some(attachments) = &event.attachments {
                    a.attachments = attachments.len();
                }
                a
            }
            (None, None) => {
                debug!(message_id = %event.id, "Edit of an unknown message; skipped");
                return;
            }
        };
        if before.is_none() {
            self.tracker.record(after.clone());
        }
        self.run(RawEvent::MessageEdited { before, after }).await;
    }

    async fn message_delete(
        &self,
        _ctx: Context,
        channel_id: ChannelId,
        deleted_message_id: MessageId,
        _guild_id: Option<GuildId>,
    ) {
        match self.tracker.take(domain::MessageId(deleted_message_id.get())) {
            Some(snapshot) => self.run(RawEvent::MessageDeleted(snapshot)).await,
            None => debug!(
                channel_id = %channel_id,
                message_id = %deleted_message_id,
                "Deleted message was not tracked; skipped"
            ),
        }
    }

    async fn guild_member_addition(&self, ctx: Context, new_member: Member) {
        let raw = RawEvent::MemberJoined {
            member: convert::member(&ctx.cache, &new_member),
            member_count: convert::member_count(&ctx.cache, new_member.guild_id),
        };
        self.run(raw).await;
    }

    async fn guild_member_removal(
        &self,
        ctx: Context,
        guild_id: GuildId,
        user: User,
        member_data_if_available: Option<Member>,
    ) {
        self.tracker.forget_presence(guild_id.get(), user.id.get());
        let raw = RawEvent::MemberLeft {
            tenant_id: convert::tenant(guild_id),
            user: convert::user(&user),
            joined_at: member_data_if_available
                .and_then(|m| m.joined_at)
                .map(convert::timestamp),
            member_count: convert::member_count(&ctx.cache, guild_id),
        };
        self.run(raw).await;
    }

    async fn guild_member_update(
        &self,
        ctx: Context,
        old_if_available: Option<Member>,
        new: Option<Member>,
        _event: GuildMemberUpdateEvent,
    ) {
        let Some(new) = new else {
            return;
        };
        let raw = RawEvent::MemberUpdated {
            before: old_if_available.map(|m| convert::member(&ctx.cache, &m)),
            after: convert::member(&ctx.cache, &new),
        };
        self.run(raw).await;
    }

    async fn channel_create(&self, ctx: Context, channel: GuildChannel) {
        self.run(RawEvent::ChannelCreated(convert::channel(&ctx.cache, &channel)))
            .await;
    }

    async fn channel_delete(
        &self,
        ctx: Context,
        channel: GuildChannel,
        _messages: Option<Vec<Message>>,
    ) {
        self.run(RawEvent::ChannelDeleted(convert::channel(&ctx.cache, &channel)))
            .await;
    }

    async fn channel_update(&self, ctx: Context, old: Option<GuildChannel>, new: GuildChannel) {
        let raw = RawEvent::ChannelUpdated {
            before: old.map(|c| convert::channel(&ctx.cache, &c)),
            after: convert::channel(&ctx.cache, &new),
        };
        self.run(raw).await;
    }

    async fn guild_role_create(&self, ctx: Context, new: Role) {
        self.run(RawEvent::RoleCreated(convert::role(&ctx.cache, &new)))
            .await;
    }

    async fn guild_role_delete(
        &self,
        ctx: Context,
        guild_id: GuildId,
        removed_role_id: RoleId,
        removed_role_data_if_available: Option<Role>,
    ) {
        let snapshot = match removed_role_data_if_available {
            Some(role) => convert::role(&ctx.cache, &role),
            None => convert::unknown_role(guild_id, removed_role_id),
        };
        self.run(RawEvent::RoleDeleted(snapshot)).await;
    }

    async fn guild_role_update(
        &self,
        ctx: Context,
        old_data_if_available: Option<Role>,
        new: Role,
    ) {
        let raw = RawEvent::RoleUpdated {
            before: old_data_if_available.map(|r| convert::role(&ctx.cache, &r)),
            after: convert::role(&ctx.cache, &new),
        };
        self.run(raw).await;
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };
        let user = match &new.member {
            Some(m) => convert::user(&m.user),
            None => match new.user_id.to_user(&ctx).await {
                Ok(u) => convert::user(&u),
                Err(e) => {
                    debug!(user_id = %new.user_id, error = %e, "Voice user lookup failed");
                    return;
                }
            },
        };

        let before = old.and_then(|o| o.channel_id);
        let after = new.channel_id;
        let occupancy_of = after.or(before);
        let raw = RawEvent::VoiceStateChanged {
            tenant_id: Some(convert::tenant(guild_id)),
            user,
            before: before.map(|c| convert::channel_ref(&ctx.cache, Some(guild_id), c)),
            after: after.map(|c| convert::channel_ref(&ctx.cache, Some(guild_id), c)),
            channel_members: occupancy_of
                .and_then(|c| convert::voice_occupancy(&ctx.cache, guild_id, c)),
        };
        self.run(raw).await;
    }

    async fn reaction_add(&self, ctx: Context, add_reaction: Reaction) {
        if let Some(raw) = reaction(&ctx, &self.tracker, &add_reaction).await {
            self.run(RawEvent::ReactionAdded(raw)).await;
        }
    }

    async fn reaction_remove(&self, ctx: Context, removed_reaction: Reaction) {
        if let Some(raw) = reaction(&ctx, &self.tracker, &removed_reaction).await {
            self.run(RawEvent::ReactionRemoved(raw)).await;
        }
    }

    async fn guild_update(
        &self,
        _ctx: Context,
        old_data_if_available: Option<Guild>,
        new_data: PartialGuild,
    ) {
        let raw = RawEvent::GuildUpdated {
            before: old_data_if_available.as_ref().map(convert::guild),
            after: convert::partial_guild(&new_data),
        };
        self.run(raw).await;
    }

    async fn guild_delete(
        &self,
        _ctx: Context,
        incomplete: UnavailableGuild,
        _full: Option<Guild>,
    ) {
        let forgotten = self.tracker.forget_guild(incomplete.id.get());
        debug!(guild_id = %incomplete.id, forgotten, "Guild gone; presence entries dropped");
    }

    async fn presence_update(&self, ctx: Context, new_data: Presence) {
        let Some(guild_id) = new_data.guild_id else {
            return;
        };
        // Presence payloads usually carry only the user id.
        let cached = ctx.cache.user(new_data.user.id).map(|u| convert::user(&u));
        let Some(user) = presence_user(new_data.user.bot, cached) else {
            debug!(user_id = %new_data.user.id, "Presence of a bot or uncached user; skipped");
            return;
        };

        let status = new_data.status.name();
        let before = self.tracker.swap_presence(guild_id.get(), user.id.0, status);
        // The first sighting only seeds the tracker.
        if before.is_none() {
            return;
        }

        let raw = RawEvent::PresenceUpdated {
            tenant_id: convert::tenant(guild_id),
            user,
            before,
            after: status.to_string(),
        };
        self.run(raw).await;
    }
}

async fn reaction(
    ctx: &Context,
    tracker: &MessageTracker,
    r: &Reaction,
) -> Option<ReactionSnapshot> {
    let guild_id = r.guild_id?;
    let user = match &r.member {
        Some(m) => convert::user(&m.user),
        None => match r.user(ctx).await {
            Ok(u) => convert::user(&u),
            Err(e) => {
                debug!(error = %e, "Reaction user lookup failed");
                return None;
            }
        },
    };
    let message_id = domain::MessageId(r.message_id.get());
    // Messages we track were all written by members; anything else is unknown.
    let (count, message_author_bot, message_content) =
        match ctx.cache.message(r.channel_id, r.message_id) {
            Some(m) => (
                convert::reaction_count(&m.reactions, &r.emoji),
                m.author.bot,
                Some(m.content.clone()),
            ),
            None => (None, false, tracker.get(message_id).map(|m| m.content)),
        };
    Some(ReactionSnapshot {
        tenant_id: Some(convert::tenant(guild_id)),
        user,
        channel: convert::channel_ref(&ctx.cache, Some(guild_id), r.channel_id),
        message_id,
        emoji: r.emoji.to_string(),
        count,
        message_content,
        message_author_bot,
    })
}

/// The reporting user for a presence change: resolved from the cache and
/// never a bot.
fn presence_user(partial_bot: Option<bool>, cached: Option<UserSnapshot>) -> Option<UserSnapshot> {
    if partial_bot == Some(true) {
        return None;
    }
    cached.filter(|u| !u.bot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot(bot: bool) -> UserSnapshot {
        UserSnapshot {
            id: domain::UserId(8),
            name: "dora".to_string(),
            discriminator: None,
            avatar_url: Some("https://cdn.example/d.png".to_string()),
            bot,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn presence_of_bots_is_dropped() {
        assert!(presence_user(Some(true), Some(snapshot(false))).is_none());
        assert!(presence_user(None, Some(snapshot(true))).is_none());
    }

    #[test]
    fn presence_of_uncached_users_is_dropped() {
        assert!(presence_user(None, None).is_none());
    }

    #[test]
    fn presence_uses_the_cached_profile() {
        let u = presence_user(None, Some(snapshot(false))).unwrap();
        assert_eq!(u.name, "dora");
        assert_eq!(u.avatar_url.as_deref(), Some("https://cdn.example/d.png"));
    }
}
