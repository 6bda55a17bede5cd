use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use guildlog_core::{
    config::Config, normalize::Normalizer, pipeline::Pipeline, rate_limit::RateLimiter,
    tenant::TenantConfigStore,
};
use guildlog_discord::DiscordPlatform;

#[tokio::main]
async fn main() -> Result<(), guildlog_core::Error> {
    guildlog_core::logging::init("guildlog")?;

    let cfg = Config::load()?;
    let store = Arc::new(
        TenantConfigStore::load(&cfg.tenant_config_file, cfg.tenant_defaults.clone()).await?,
    );
    let limiter = Arc::new(RateLimiter::new(
        cfg.rate_limit_capacity,
        cfg.rate_limit_window,
    ));
    let platform = Arc::new(DiscordPlatform::new());
    let pipeline = Pipeline::new(
        store,
        limiter.clone(),
        Normalizer::new(cfg.new_account_threshold),
        platform.clone(),
    );

    let shutdown = CancellationToken::new();
    let sweeper = limiter.spawn_sweeper(cfg.rate_limit_sweep_interval, shutdown.clone());

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received");
                shutdown.cancel();
            }
        });
    }

    let result = guildlog_discord::router::run_gateway(
        &cfg.discord_token,
        pipeline,
        platform,
        shutdown.clone(),
    )
    .await;

    shutdown.cancel();
    let _ = sweeper.await;

    result.map_err(|e| guildlog_core::Error::External(format!("discord gateway failed: {e}")))?;
    info!("Stopped");
    Ok(())
}
