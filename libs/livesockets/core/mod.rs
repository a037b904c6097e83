//! # LiveSockets core
//!
//! The connection manager and the pieces it is assembled from.
//!
//! ```text
//!                 subscribe / unsubscribe / get_stats
//!  caller ──────────────────────────────┐
//!                                       ▼
//!                     ┌──────────── RealtimeClient ────────────┐
//!                     │ state machine · backoff · replay-on-open │
//!                     └───────┬───────────────────────┬──────────┘
//!                    outbound │                       │ inbound
//!               HeartbeatMonitor ──ping──▶ socket ──▶ MessageRouter
//!                                                     │    │     │
//!                                        SubscriptionRegistry │  Listeners
//!                                           (fan-out)   StatsRequests
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use livesockets::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = livesockets::builder()
//!         .base_url("https://civic.example.org")
//!         .path("/ws/search")
//!         .token_provider(StaticToken::new("session-token"))
//!         .build()?;
//!
//!     client.subscribe(Subscription::new("road", [EntityType::Post], |event: &Event| {
//!         println!("{:?} {}", event.event_type, event.entity_id);
//!     }));
//!     client.connect(None);
//!
//!     let stats = client.get_stats(std::time::Duration::from_secs(5)).await?;
//!     println!("{:?}", stats);
//!     client.disconnect();
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod connection_state;
pub mod heartbeat;
pub mod listeners;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod stats;

// Re-export main types
pub use builder::{states, RealtimeClientBuilder};
pub use client::{Metrics, RealtimeClient};
pub use config::{derive_endpoint, ClientConfig};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
pub use heartbeat::HeartbeatMonitor;
pub use listeners::{ClientEvent, Listeners};
pub use protocol::{ClientFrame, ConnectionStats, EntityType, Event, EventType, Filters, ServerMessage};
pub use registry::{Subscription, SubscriptionInfo, SubscriptionRegistry};
pub use router::{MessageRouter, RouteOutcome};
pub use stats::StatsRequests;

// Re-export traits for convenience
pub use crate::traits::*;

/// Create a new realtime client builder
///
/// # Example
/// ```ignore
/// let client = livesockets::builder()
///     .base_url("https://civic.example.org")
///     .path("/ws/analytics")
///     .heartbeat(Duration::from_secs(30))
///     .reconnect_policy(ExponentialBackoff::default())
///     .build()?;
/// ```
pub fn builder() -> RealtimeClientBuilder<builder::states::NoUrl> {
    RealtimeClientBuilder::new()
}
