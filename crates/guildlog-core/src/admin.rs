//! Prefixed administrator commands.
//!
//! Parsing and execution only; the adapter decides who may run them and how
//! replies are shown.

use chrono::Utc;
use regex::Regex;

use crate::{
    dispatch::DeliveryResult,
    domain::{ChannelId, SubjectId, TenantId},
    errors::Error,
    event::{Actor, CategoryGroup},
    formatting::{colors, Notification, NotificationBuilder},
    pipeline::Pipeline,
};

const MAX_PREFIX_LEN: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdminCommand {
    /// `None` means the channel the command was sent in.
    SetLogChannel(Option<ChannelId>),
    RemoveLogChannel,
    ToggleLogs(String),
    Exclude(SubjectId),
    Include(SubjectId),
    LogStatus,
    TestLog,
    SetPrefix(String),
    Help,
    /// Known command with unusable arguments; carries the usage line.
    Usage(&'static str),
}

impl AdminCommand {
    /// `None` when `text` is not addressed to us (wrong prefix or unknown name).
    pub fn parse(prefix: &str, text: &str) -> Option<Self> {
        let rest = text.trim().strip_prefix(prefix)?;
        let mut parts = rest.trim_start().splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or("").to_lowercase();
        let args = parts.next().unwrap_or("").trim();

        let cmd = match name.as_str() {
            "setlogchannel" => {
                if args.is_empty() {
                    AdminCommand::SetLogChannel(None)
                } else {
                    match parse_channel(args) {
                        Some(id) => AdminCommand::SetLogChannel(Some(id)),
                        None => AdminCommand::Usage("setlogchannel [#channel]"),
                    }
                }
            }
            "removelogchannel" => AdminCommand::RemoveLogChannel,
            "togglelogs" => match args.split_whitespace().next() {
                Some(group) => AdminCommand::ToggleLogs(group.to_string()),
                None => AdminCommand::Usage(
                    "togglelogs <messages|members|channels|roles|voice|presence>",
                ),
            },
            "exclude" => match parse_user(args) {
                Some(id) => AdminCommand::Exclude(id),
                None => AdminCommand::Usage("exclude <@user|id>"),
            },
            "include" => match parse_user(args) {
                Some(id) => AdminCommand::Include(id),
                None => AdminCommand::Usage("include <@user|id>"),
            },
            "logstatus" => AdminCommand::LogStatus,
            "testlog" => AdminCommand::TestLog,
            "setprefix" => {
                let p = args.split_whitespace().next().unwrap_or("");
                if p.is_empty() || p.chars().count() > MAX_PREFIX_LEN {
                    AdminCommand::Usage("setprefix <prefix, at most 5 characters>")
                } else {
                    AdminCommand::SetPrefix(p.to_string())
                }
            }
            "help" | "loghelp" => AdminCommand::Help,
            _ => return None,
        };
        Some(cmd)
    }
}

/// Prefixed text is meant for a bot, whether or not we know the command, and
/// is never logged as a message.
pub fn is_command_text(prefix: &str, text: &str) -> bool {
    !prefix.is_empty() && text.trim().starts_with(prefix)
}

fn parse_channel(arg: &str) -> Option<ChannelId> {
    let re = Regex::new(r"^(?:<#(\d+)>|(\d+))$").ok()?;
    capture_id(&re, arg).map(ChannelId)
}

fn parse_user(arg: &str) -> Option<SubjectId> {
    let re = Regex::new(r"^(?:<@!?(\d+)>|(\d+))$").ok()?;
    capture_id(&re, arg).map(SubjectId)
}

fn capture_id(re: &Regex, arg: &str) -> Option<u64> {
    let caps = re.captures(arg.trim())?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

/// Where and by whom a command was issued.
#[derive(Clone, Debug)]
pub struct Invocation {
    pub tenant_id: TenantId,
    pub channel_id: ChannelId,
    pub invoker: Actor,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Card(Notification),
}

pub async fn execute(pipeline: &Pipeline, inv: &Invocation, cmd: AdminCommand) -> Reply {
    let store = &pipeline.store;
    let tenant_id = inv.tenant_id;
    let prefix = store.command_prefix(tenant_id);

    match cmd {
        AdminCommand::SetLogChannel(target) => {
            let channel_id = target.unwrap_or(inv.channel_id);
            if let Err(reason) = pipeline.dispatcher.resolve(tenant_id, channel_id).await {
                return Reply::Text(format!(
                    "❌ Cannot use {}: {}",
                    channel_id.mention(),
                    DeliveryResult::Skipped(reason)
                ));
            }
            store.set_destination_channel(tenant_id, channel_id).await;

            let card =
                NotificationBuilder::new("✅ Log channel configured", colors::GREEN, Utc::now())
                    .description(format!(
                        "Server events will be logged here.\n**Set by:** {}",
                        inv.invoker.reference()
                    ))
                    .build(|| format!("Server: {tenant_id}"));
            let announced = pipeline.dispatcher.dispatch(tenant_id, &card).await;
            let mut text = format!("✅ Log channel set to {}", channel_id.mention());
            if !announced.is_delivered() {
                text.push_str(&format!("\n⚠️ Confirmation not posted there ({announced})"));
            }
            Reply::Text(text)
        }
        AdminCommand::RemoveLogChannel => {
            if store.remove_destination_channel(tenant_id).await {
                Reply::Text("✅ Log channel removed; logging is off for this server".to_string())
            } else {
                Reply::Text("ℹ️ No log channel was configured".to_string())
            }
        }
        AdminCommand::ToggleLogs(name) => match store.toggle_category(tenant_id, &name).await {
            Ok(enabled) => {
                // The parse already succeeded inside the store.
                let label = name
                    .parse::<CategoryGroup>()
                    .map(|g| g.label())
                    .unwrap_or("Category");
                Reply::Text(format!(
                    "{} {label} logging is now **{}**",
                    if enabled { "✅" } else { "❌" },
                    if enabled { "enabled" } else { "disabled" }
                ))
            }
            Err(Error::InvalidCategory { name }) => Reply::Text(format!(
                "❌ Unknown category `{name}`. Valid: {}",
                CategoryGroup::ALL.map(|g| g.as_str()).join(", ")
            )),
            Err(e) => Reply::Text(format!("❌ {e}")),
        },
        AdminCommand::Exclude(subject) => {
            let changed = store.exclude_subject(tenant_id, subject).await;
            Reply::Text(if changed {
                format!("✅ <@{subject}> will no longer be logged")
            } else {
                format!("ℹ️ <@{subject}> is already excluded")
            })
        }
        AdminCommand::Include(subject) => {
            let changed = store.include_subject(tenant_id, subject).await;
            Reply::Text(if changed {
                format!("✅ <@{subject}> will be logged again")
            } else {
                format!("ℹ️ <@{subject}> was not excluded")
            })
        }
        AdminCommand::LogStatus => Reply::Card(status_card(pipeline, tenant_id)),
        AdminCommand::TestLog => {
            let card = NotificationBuilder::new("🧪 Test notification", colors::GOLD, Utc::now())
                .description(format!(
                    "Logging works for this server.\n**Requested by:** {}",
                    inv.invoker.reference()
                ))
                .thumbnail(inv.invoker.avatar_url.clone())
                .field("Server ID", tenant_id.to_string(), true)
                .field("Prefix", prefix.as_str(), true)
                .build(|| format!("Server: {tenant_id}"));
            Reply::Text(match pipeline.dispatcher.dispatch(tenant_id, &card).await {
                DeliveryResult::Delivered => "✅ Test notification sent".to_string(),
                other => format!("⚠️ Test notification {other}"),
            })
        }
        AdminCommand::SetPrefix(p) => {
            store.set_command_prefix(tenant_id, &p).await;
            Reply::Text(format!("✅ Command prefix set to `{p}`"))
        }
        AdminCommand::Help => Reply::Text(help_text(&prefix)),
        AdminCommand::Usage(usage) => Reply::Text(format!("Usage: `{prefix}{usage}`")),
    }
}

fn status_card(pipeline: &Pipeline, tenant_id: TenantId) -> Notification {
    let cfg = pipeline.store.get(tenant_id);
    let destination = cfg
        .destination_channel_id
        .map(ChannelId::mention)
        .unwrap_or_else(|| "❌ Not set".to_string());

    let mut b = NotificationBuilder::new("📊 Logging status", colors::BLUE, Utc::now())
        .field("Log channel", destination, false);
    for group in CategoryGroup::ALL {
        let state = if cfg.enabled_categories.get(group) {
            "✅ Enabled"
        } else {
            "❌ Disabled"
        };
        b = b.field(group.label(), state, true);
    }
    b.field(
        "Excluded users",
        cfg.excluded_subjects.len().to_string(),
        true,
    )
    .field("Prefix", format!("`{}`", cfg.command_prefix), true)
    .build(|| format!("Server: {tenant_id}"))
}

fn help_text(prefix: &str) -> String {
    [
        ("setlogchannel [#channel]", "log to this (or the given) channel"),
        ("removelogchannel", "stop logging"),
        ("togglelogs <category>", "enable/disable a category"),
        ("exclude <@user>", "stop logging a user"),
        ("include <@user>", "resume logging a user"),
        ("logstatus", "show the current settings"),
        ("testlog", "send a test notification"),
        ("setprefix <prefix>", "change the command prefix"),
    ]
    .iter()
    .map(|(cmd, what)| format!("`{prefix}{cmd}` {what}"))
    .collect::<Vec<_>>()
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::TenantDefaults,
        domain::UserId,
        normalize::Normalizer,
        platform::{ChannelHandle, PlatformClient},
        rate_limit::RateLimiter,
        tenant::TenantConfigStore,
        Result,
    };
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[test]
    fn parses_commands_with_prefix() {
        assert_eq!(
            AdminCommand::parse("!", "!setlogchannel <#123>"),
            Some(AdminCommand::SetLogChannel(Some(ChannelId(123))))
        );
        assert_eq!(
            AdminCommand::parse("!", "!setlogchannel"),
            Some(AdminCommand::SetLogChannel(None))
        );
        assert_eq!(
            AdminCommand::parse("!", "!ToggleLogs Voice"),
            Some(AdminCommand::ToggleLogs("Voice".to_string()))
        );
        assert_eq!(
            AdminCommand::parse("!", "!exclude <@!42>"),
            Some(AdminCommand::Exclude(SubjectId(42)))
        );
        assert_eq!(
            AdminCommand::parse("!", "!include 42"),
            Some(AdminCommand::Include(SubjectId(42)))
        );
        assert_eq!(
            AdminCommand::parse("??", "?? logstatus"),
            Some(AdminCommand::LogStatus)
        );
    }

    #[test]
    fn ignores_foreign_text() {
        assert_eq!(AdminCommand::parse("!", "hello"), None);
        assert_eq!(AdminCommand::parse("!", "?logstatus"), None);
        assert_eq!(AdminCommand::parse("!", "!play music"), None);
    }

    #[test]
    fn unknown_prefixed_text_is_still_command_text() {
        assert!(is_command_text("!", "!play music"));
        assert!(is_command_text("!", "  !logstatus"));
        assert!(!is_command_text("!", "hello there everyone"));
        assert!(!is_command_text("", "anything"));
    }

    #[test]
    fn bad_arguments_yield_usage() {
        assert!(matches!(
            AdminCommand::parse("!", "!exclude somebody"),
            Some(AdminCommand::Usage(_))
        ));
        assert!(matches!(
            AdminCommand::parse("!", "!togglelogs"),
            Some(AdminCommand::Usage(_))
        ));
        assert!(matches!(
            AdminCommand::parse("!", "!setprefix waytoolong"),
            Some(AdminCommand::Usage(_))
        ));
    }

    /// Every channel belongs to guild 1; records titles sent.
    #[derive(Default)]
    struct RecordingPlatform {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PlatformClient for RecordingPlatform {
        async fn resolve_channel(
            &self,
            _tenant_id: TenantId,
            channel_id: ChannelId,
        ) -> Option<ChannelHandle> {
            Some(ChannelHandle {
                tenant_id: TenantId(1),
                channel_id,
                name: "logs".to_string(),
            })
        }

        async fn send_notification(
            &self,
            _channel: &ChannelHandle,
            notification: &Notification,
        ) -> Result<()> {
            self.sent.lock().unwrap().push(notification.title.clone());
            Ok(())
        }
    }

    fn pipeline(name: &str, platform: Arc<RecordingPlatform>) -> Pipeline {
        let path = std::env::temp_dir()
            .join(format!("guildlog-admin-{}", std::process::id()))
            .join(format!("{name}.json"));
        Pipeline::new(
            Arc::new(TenantConfigStore::new(path, TenantDefaults::default())),
            Arc::new(RateLimiter::default()),
            Normalizer::default(),
            platform,
        )
    }

    fn inv(tenant: u64) -> Invocation {
        Invocation {
            tenant_id: TenantId(tenant),
            channel_id: ChannelId(500),
            invoker: Actor {
                id: UserId(9),
                name: "admin".to_string(),
                discriminator: None,
                avatar_url: None,
            },
        }
    }

    fn text(r: Reply) -> String {
        match r {
            Reply::Text(t) => t,
            Reply::Card(c) => panic!("expected text, got card {}", c.title),
        }
    }

    #[tokio::test]
    async fn setlogchannel_defaults_to_current_channel_and_announces() {
        let platform = Arc::new(RecordingPlatform::default());
        let p = pipeline("setlog", platform.clone());

        let r = text(execute(&p, &inv(1), AdminCommand::SetLogChannel(None)).await);
        assert!(r.contains("<#500>"), "{r}");
        assert_eq!(p.store.destination(TenantId(1)), Some(ChannelId(500)));
        assert_eq!(platform.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn setlogchannel_rejects_channel_of_another_guild() {
        let p = pipeline("setlog_foreign", Arc::new(RecordingPlatform::default()));
        let r = text(execute(&p, &inv(2), AdminCommand::SetLogChannel(Some(ChannelId(7)))).await);
        assert!(r.starts_with("❌"), "{r}");
        assert_eq!(p.store.destination(TenantId(2)), None);
    }

    #[tokio::test]
    async fn toggle_reports_new_state_and_rejects_unknown_names() {
        let p = pipeline("toggle", Arc::new(RecordingPlatform::default()));
        let r = text(execute(&p, &inv(1), AdminCommand::ToggleLogs("voice".to_string())).await);
        assert!(r.contains("Voice activity logging is now **disabled**"), "{r}");

        let r = text(execute(&p, &inv(1), AdminCommand::ToggleLogs("bogus".to_string())).await);
        assert!(r.contains("Unknown category `bogus`"), "{r}");
    }

    #[tokio::test]
    async fn status_card_lists_every_group() {
        let p = pipeline("status", Arc::new(RecordingPlatform::default()));
        match execute(&p, &inv(1), AdminCommand::LogStatus).await {
            Reply::Card(card) => {
                assert_eq!(card.fields[0].value, "❌ Not set");
                assert_eq!(card.fields.len(), 1 + CategoryGroup::ALL.len() + 2);
            }
            Reply::Text(t) => panic!("expected card, got {t}"),
        }
    }

    #[tokio::test]
    async fn testlog_surfaces_skip() {
        let platform = Arc::new(RecordingPlatform::default());
        let p = pipeline("testlog", platform.clone());
        let r = text(execute(&p, &inv(1), AdminCommand::TestLog).await);
        assert!(r.contains("no log channel configured"), "{r}");
        assert!(platform.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn help_uses_the_tenant_prefix() {
        assert!(help_text("?").contains("`?logstatus`"));
    }
}
