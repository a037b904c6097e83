//! Follow a search query live
//!
//! Usage: live_search [--config path] <query words...>
//!
//! Connects to the search endpoint, subscribes to the query for posts,
//! comments and petitions, and logs every matching event until Ctrl+C.

use anyhow::{bail, Result};
use civic_live::bin_common::{load_config_from_env, parse_args, CliArgs, ShutdownManager};
use civic_live::livesockets::{ClientEvent, EntityType, Event};
use civic_live::{init_tracing, RealtimeSettings};
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let args = CliArgs::from_args(parse_args());
    let settings = RealtimeSettings::load(load_config_from_env(args.config_source()))?;
    init_tracing(&settings.log_level);
    settings.log();

    let query = args.positional.join(" ");
    if query.trim().is_empty() {
        bail!("usage: live_search [--config path] <query words...>");
    }

    let shutdown = ShutdownManager::new();
    shutdown.spawn_signal_handler();

    let search = settings.build_search_client()?;
    let events = search.client().events();

    let subscription_id = search.subscribe_to_search(
        query.clone(),
        [EntityType::Post, EntityType::Comment, EntityType::Petition],
        None,
        |event: &Event| {
            info!(
                event_type = ?event.event_type,
                entity_type = ?event.entity_type,
                entity_id = %event.entity_id,
                "Live result"
            );
        },
    );
    if subscription_id.is_none() {
        bail!("could not register search subscription");
    }

    info!("Following \"{}\" - press Ctrl+C to stop", query);
    search.connect(None);

    while shutdown.is_running() {
        for event in events.try_iter() {
            match event {
                ClientEvent::Connected => info!("Connected"),
                ClientEvent::Disconnected => warn!("Disconnected"),
                ClientEvent::Reconnecting { attempt, delay } => {
                    info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting")
                }
                ClientEvent::Error(message) => warn!(%message, "Connection error"),
                ClientEvent::ServerError { message, .. } => error!(%message, "Server error"),
                ClientEvent::ReconnectExhausted { attempts } => {
                    error!(attempts, "Giving up on realtime updates");
                    shutdown.trigger();
                }
                _ => {}
            }
        }
        shutdown.interruptible_sleep(Duration::from_millis(250)).await;
    }

    let metrics = search.client().metrics();
    info!(
        sent = metrics.messages_sent,
        received = metrics.messages_received,
        reconnects = metrics.reconnect_count,
        "Shutting down"
    );
    search.disconnect();

    Ok(())
}
