use std::{env, path::PathBuf, time::Duration};

use crate::{
    errors::Error, event::CategoryToggles, normalize::DEFAULT_NEW_ACCOUNT_THRESHOLD_DAYS, Result,
};

/// Upper bound for `NEW_ACCOUNT_DAYS`.
const MAX_NEW_ACCOUNT_DAYS: u64 = 3650;

/// Settings every new tenant starts from until an administrator changes them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantDefaults {
    pub command_prefix: String,
    pub categories: CategoryToggles,
}

impl Default for TenantDefaults {
    fn default() -> Self {
        Self {
            command_prefix: "!".to_string(),
            categories: CategoryToggles::all_enabled(),
        }
    }
}

/// Typed process configuration.
#[derive(Clone, Debug)]
pub struct Config {
    // Credentials
    pub discord_token: String,

    // Tenant config document
    pub tenant_config_file: PathBuf,
    pub tenant_defaults: TenantDefaults,

    // Rate limiting
    pub rate_limit_capacity: usize,
    pub rate_limit_window: Duration,
    pub rate_limit_sweep_interval: Duration,

    // Formatting
    pub new_account_threshold: chrono::Duration,
}

impl Config {
    /// Load from the environment (and `.env`, which never overrides existing variables).
    pub fn load() -> Result<Self> {
        let cfg = Self::from_env();
        if cfg.discord_token.trim().is_empty() {
            return Err(Error::Config(
                "DISCORD_BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        Ok(cfg)
    }

    /// Same as [`Config::load`] without the credential check.
    pub fn from_env() -> Self {
        // A missing .env is the normal case in containers.
        let _ = dotenvy::dotenv();

        let discord_token = env_str("DISCORD_BOT_TOKEN").unwrap_or_default();

        let tenant_config_file = PathBuf::from(
            env_str("TENANT_CONFIG_FILE").unwrap_or("guildlog_config.json".to_string()),
        );

        let command_prefix = env_str("BOT_PREFIX")
            .and_then(non_empty)
            .unwrap_or("!".to_string());
        let categories = CategoryToggles {
            messages: env_bool("LOG_MESSAGES").unwrap_or(true),
            members: env_bool("LOG_MEMBERS").unwrap_or(true),
            channels: env_bool("LOG_CHANNELS").unwrap_or(true),
            roles: env_bool("LOG_ROLES").unwrap_or(true),
            voice: env_bool("LOG_VOICE").unwrap_or(true),
            presence: env_bool("LOG_PRESENCE").unwrap_or(true),
        };

        let rate_limit_capacity = env_usize("RATE_LIMIT_CAPACITY").unwrap_or(5).max(1);
        let rate_limit_window =
            Duration::from_secs(env_u64("RATE_LIMIT_WINDOW_SECS").unwrap_or(60).max(1));
        let rate_limit_sweep_interval =
            Duration::from_secs(env_u64("RATE_LIMIT_SWEEP_SECS").unwrap_or(300).max(1));

        let new_account_threshold = new_account_threshold(env_u64("NEW_ACCOUNT_DAYS"));

        Self {
            discord_token,
            tenant_config_file,
            tenant_defaults: TenantDefaults {
                command_prefix,
                categories,
            },
            rate_limit_capacity,
            rate_limit_window,
            rate_limit_sweep_interval,
            new_account_threshold,
        }
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn new_account_threshold(days: Option<u64>) -> chrono::Duration {
    days.map(|d| d.min(MAX_NEW_ACCOUNT_DAYS))
        .and_then(|d| i64::try_from(d).ok())
        .and_then(chrono::Duration::try_days)
        .unwrap_or_else(|| chrono::Duration::days(DEFAULT_NEW_ACCOUNT_THRESHOLD_DAYS))
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.trim().to_string())
    }
}
