//! # LiveSockets
//!
//! A real-time update client that multiplexes many logical subscriptions
//! over a single WebSocket connection.
//!
//! ## Features
//!
//! - **One connection, many subscribers**: subscriptions live in a registry and
//!   are replayed on every (re)connection
//! - **Fan-out routing**: each inbound event reaches exactly the subscriptions
//!   whose query and entity types match it
//! - **Exponential backoff**: bounded reconnection with a hard attempt ceiling
//! - **Heartbeats**: periodic `ping` frames keep idle connections open
//! - **Stats correlation**: one-shot `get_stats` requests resolved or timed out
//! - **Non-blocking API**: every public method returns after mutating local state

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use crate::core::{
    builder, client, config, connection_state, heartbeat, listeners, protocol, registry, router,
    stats,
    builder::{states, RealtimeClientBuilder},
    client::{Metrics, RealtimeClient},
    config::{derive_endpoint, ClientConfig},
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState},
    heartbeat::HeartbeatMonitor,
    listeners::{ClientEvent, Listeners},
    protocol::{ClientFrame, ConnectionStats, EntityType, Event, EventType, Filters, ServerMessage},
    registry::{Subscription, SubscriptionInfo, SubscriptionRegistry},
    router::{MessageRouter, RouteOutcome},
    stats::StatsRequests,
};

// Convenience function
pub use crate::core::builder as client_builder;
