use std::{sync::Arc, time::Duration};

use serenity::{cache::Settings as CacheSettings, Client};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use guildlog_core::pipeline::Pipeline;

use crate::{handler::GuildLogHandler, tracker::MessageTracker, DiscordPlatform};

const TRACKER_PRUNE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Per channel; reaction counts and authors are read from these.
const CACHED_MESSAGES: usize = 200;

/// Connect to the gateway and process events until `shutdown` fires or the
/// connection fails for good.
pub async fn run_gateway(
    token: &str,
    pipeline: Pipeline,
    platform: Arc<DiscordPlatform>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let tracker = Arc::new(MessageTracker::default());
    let handler = GuildLogHandler::new(pipeline, tracker.clone());

    let mut cache_settings = CacheSettings::default();
    cache_settings.max_messages = CACHED_MESSAGES;

    let mut client = Client::builder(token, GuildLogHandler::intents())
        .cache_settings(cache_settings)
        .event_handler(handler)
        .await?;
    platform.attach(client.http.clone(), client.cache.clone());

    let pruner = {
        let tracker = tracker.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TRACKER_PRUNE_INTERVAL);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        tracker.prune_at(std::time::Instant::now());
                    }
                }
            }
        })
    };

    let shard_manager = client.shard_manager.clone();
    let stopper = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            info!("Shutting down gateway");
            shard_manager.shutdown_all().await;
        })
    };

    info!("Starting Discord gateway");
    let result = client.start_autosharded().await;

    shutdown.cancel();
    let _ = pruner.await;
    let _ = stopper.await;

    if let Err(e) = result {
        error!(error = %e, "Gateway stopped with an error");
        return Err(e.into());
    }
    Ok(())
}
