//! Discord adapter (serenity).
//!
//! This crate implements the `guildlog-core` PlatformClient over the Discord
//! REST API and turns gateway callbacks into core `RawEvent`s.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serenity::{
    all::{Cache, Http},
    builder::{CreateEmbed, CreateEmbedFooter, CreateMessage},
    model::{id, Timestamp},
};
use tracing::debug;

pub mod convert;
pub mod handler;
pub mod router;
pub mod tracker;

use guildlog_core::{
    domain::{ChannelId, TenantId},
    errors::Error,
    formatting::Notification,
    platform::{ChannelHandle, PlatformClient},
    Result,
};

/// Discord implementation of the platform port.
///
/// Created before the gateway client exists; [`DiscordPlatform::attach`] wires in
/// the client's HTTP handle and cache once it is built.
#[derive(Default)]
pub struct DiscordPlatform {
    http: OnceLock<Arc<Http>>,
    cache: OnceLock<Arc<Cache>>,
}

impl DiscordPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, http: Arc<Http>, cache: Arc<Cache>) {
        let _ = self.http.set(http);
        let _ = self.cache.set(cache);
    }

    fn http(&self) -> Result<&Arc<Http>> {
        self.http
            .get()
            .ok_or_else(|| Error::Delivery("discord client not connected".to_string()))
    }

    fn map_err(e: serenity::Error) -> Error {
        Error::Delivery(format!("discord error: {e}"))
    }

    /// Cache first; falls back to a REST lookup.
    async fn lookup(&self, channel_id: id::ChannelId) -> Option<ChannelHandle> {
        if let Some(cache) = self.cache.get() {
            if let Some(handle) = cached_channel(cache, channel_id) {
                return Some(handle);
            }
        }

        let http = self.http.get()?;
        match channel_id.to_channel(http).await {
            Ok(channel) => {
                let gc = channel.guild()?;
                Some(ChannelHandle {
                    tenant_id: TenantId(gc.guild_id.get()),
                    channel_id: ChannelId(gc.id.get()),
                    name: gc.name,
                })
            }
            Err(e) => {
                debug!(channel_id = %channel_id, error = %e, "Channel lookup failed");
                None
            }
        }
    }
}

fn cached_channel(cache: &Cache, channel_id: id::ChannelId) -> Option<ChannelHandle> {
    cache.guilds().into_iter().find_map(|guild_id| {
        let guild = cache.guild(guild_id)?;
        let gc = guild.channels.get(&channel_id)?;
        Some(ChannelHandle {
            tenant_id: TenantId(guild_id.get()),
            channel_id: ChannelId(gc.id.get()),
            name: gc.name.clone(),
        })
    })
}

/// `None` for id 0, which Discord never assigns.
pub(crate) fn discord_channel(channel_id: ChannelId) -> Option<id::ChannelId> {
    (channel_id.0 != 0).then(|| id::ChannelId::new(channel_id.0))
}

/// Render a core notification as a Discord embed message.
pub fn embed_message(n: &Notification) -> CreateMessage {
    let mut embed = CreateEmbed::new()
        .title(&n.title)
        .description(&n.description)
        .colour(n.color)
        .footer(CreateEmbedFooter::new(&n.footer));
    for f in &n.fields {
        embed = embed.field(&f.name, &f.value, f.inline);
    }
    if let Some(url) = &n.thumbnail_url {
        embed = embed.thumbnail(url);
    }
    if let Ok(ts) = Timestamp::from_unix_timestamp(n.timestamp.timestamp()) {
        embed = embed.timestamp(ts);
    }
    CreateMessage::new().embed(embed)
}

#[async_trait]
impl PlatformClient for DiscordPlatform {
    async fn resolve_channel(
        &self,
        tenant_id: TenantId,
        channel_id: ChannelId,
    ) -> Option<ChannelHandle> {
        let handle = self.lookup(discord_channel(channel_id)?).await;
        if handle.is_none() {
            debug!(tenant_id = %tenant_id, channel_id = %channel_id, "Channel not resolvable");
        }
        handle
    }

    async fn send_notification(
        &self,
        channel: &ChannelHandle,
        notification: &Notification,
    ) -> Result<()> {
        let http = self.http()?;
        let target = discord_channel(channel.channel_id)
            .ok_or_else(|| Error::Delivery("invalid channel id 0".to_string()))?;
        target
            .send_message(http, embed_message(notification))
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use guildlog_core::formatting::{colors, NotificationBuilder};

    fn card() -> Notification {
        NotificationBuilder::new(
            "🗑️ Message deleted",
            colors::RED,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        )
        .description("**Author:** <@5>")
        .field("Content", "gone", false)
        .field("Attachments", "2", true)
        .thumbnail(Some("https://cdn.example/a.png".to_string()))
        .footer("Server: 77 | ID: 1")
        .build(String::new)
    }

    #[test]
    fn notification_maps_onto_the_embed() {
        let json = serde_json::to_value(embed_message(&card())).unwrap();
        let embed = &json["embeds"][0];

        assert_eq!(embed["title"], "🗑️ Message deleted");
        assert_eq!(embed["description"], "**Author:** <@5>");
        assert_eq!(embed["color"], colors::RED);
        assert_eq!(embed["footer"]["text"], "Server: 77 | ID: 1");
        assert_eq!(embed["thumbnail"]["url"], "https://cdn.example/a.png");

        let fields = embed["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0]["name"], "Content");
        assert_eq!(fields[0]["value"], "gone");
        assert_eq!(fields[0]["inline"], false);
        assert_eq!(fields[1]["name"], "Attachments");
        assert_eq!(fields[1]["inline"], true);
    }

    #[test]
    fn channel_zero_is_never_addressed() {
        assert!(discord_channel(ChannelId(0)).is_none());
        assert_eq!(discord_channel(ChannelId(42)).map(|c| c.get()), Some(42));
    }
}
