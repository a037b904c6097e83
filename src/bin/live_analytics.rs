//! Watch platform analytics live
//!
//! Logs `platform_metrics` events and `current_metrics` frames, and polls
//! connection statistics every 30 seconds until Ctrl+C.

use anyhow::Result;
use civic_live::bin_common::{load_config_from_env, parse_args, CliArgs, ShutdownManager};
use civic_live::livesockets::Event;
use civic_live::{init_tracing, RealtimeSettings};
use std::time::Duration;
use tracing::{info, warn};

const STATS_EVERY: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let args = CliArgs::from_args(parse_args());
    let settings = RealtimeSettings::load(load_config_from_env(args.config_source()))?;
    init_tracing(&settings.log_level);
    settings.log();

    let shutdown = ShutdownManager::new();
    shutdown.spawn_signal_handler();

    let analytics = settings.build_analytics_client()?;
    let metrics = analytics.metrics_stream();
    analytics.subscribe_to_metrics(|event: &Event| {
        info!(payload = %event.payload, "Platform metrics");
    });
    analytics.connect(None);

    while shutdown.is_running() {
        shutdown.interruptible_sleep(STATS_EVERY).await;
        for payload in metrics.drain() {
            info!(%payload, "Current metrics");
        }

        if !analytics.client().is_connected() {
            continue;
        }
        match analytics.get_stats(Duration::from_secs(settings.stats_timeout_secs)).await {
            Ok(stats) => info!(
                total_connections = ?stats.total_connections,
                active_subscriptions = ?stats.active_subscriptions,
                "Connection stats"
            ),
            Err(e) => warn!("Stats request failed: {}", e),
        }
    }

    analytics.disconnect();
    Ok(())
}
