//! Inbound frame routing
//!
//! ```text
//! socket ─▶ parse ─▶ batch_update ──────────▶ registry fan-out ─▶ handlers
//!                 ├─ stats ──────────────────▶ pending stats request
//!                 ├─ connection_status,
//!                 │  current_metrics, error ─▶ listeners
//!                 ├─ pong ───────────────────▶ liveness timestamp
//!                 └─ confirmations, unknown ─▶ log only
//! ```
//!
//! One bad frame never takes the connection down: parse failures and
//! unknown frame types are logged and dropped.

use crate::core::connection_state::AtomicMetrics;
use crate::core::listeners::{ClientEvent, Listeners};
use crate::core::protocol::{ConnectionStats, Event, ServerMessage};
use crate::core::registry::SubscriptionRegistry;
use crate::core::stats::StatsRequests;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// What the router did with a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// `batch_update` fanned out
    Fanout { events: usize, deliveries: usize },
    /// Subscription confirmation (informational)
    Confirmation,
    /// Forwarded to listeners
    Forwarded,
    /// `stats` response; `resolved` is false when nothing was waiting
    Stats { resolved: bool },
    Pong,
    /// Malformed, binary garbage or unknown type
    Dropped,
}

pub struct MessageRouter {
    registry: Arc<SubscriptionRegistry>,
    stats: Arc<StatsRequests>,
    listeners: Arc<Listeners>,
    metrics: Arc<AtomicMetrics>,
}

impl MessageRouter {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        stats: Arc<StatsRequests>,
        listeners: Arc<Listeners>,
        metrics: Arc<AtomicMetrics>,
    ) -> Self {
        Self {
            registry,
            stats,
            listeners,
            metrics,
        }
    }

    /// Route one text frame
    pub fn route_text(&self, text: &str) -> RouteOutcome {
        match ServerMessage::parse(text) {
            Ok(message) => self.dispatch(message),
            Err(e) => {
                warn!(error = %e, frame = %truncate(text, 200), "Dropping malformed frame");
                RouteOutcome::Dropped
            }
        }
    }

    /// Route one binary frame carrying UTF-8 JSON
    pub fn route_binary(&self, data: &[u8]) -> RouteOutcome {
        match std::str::from_utf8(data) {
            Ok(text) => self.route_text(text),
            Err(_) => {
                warn!(bytes = data.len(), "Dropping non UTF-8 binary frame");
                RouteOutcome::Dropped
            }
        }
    }

    pub fn dispatch(&self, message: ServerMessage) -> RouteOutcome {
        match message {
            ServerMessage::BatchUpdate { events } => {
                let deliveries = events.iter().map(|event| self.fan_out(event)).sum();
                debug!(events = events.len(), deliveries, "Batch update routed");
                RouteOutcome::Fanout {
                    events: events.len(),
                    deliveries,
                }
            }
            ServerMessage::SubscriptionConfirmed { subscription_id } => {
                debug!(subscription_id = %subscription_id, "Subscription confirmed");
                RouteOutcome::Confirmation
            }
            ServerMessage::UnsubscriptionConfirmed { subscription_id } => {
                debug!(subscription_id = %subscription_id, "Unsubscription confirmed");
                RouteOutcome::Confirmation
            }
            ServerMessage::ConnectionStatus { status } => {
                self.listeners.emit(ClientEvent::ConnectionStatus(status));
                RouteOutcome::Forwarded
            }
            ServerMessage::CurrentMetrics { data } => {
                self.listeners.emit(ClientEvent::CurrentMetrics(data));
                RouteOutcome::Forwarded
            }
            ServerMessage::Stats { data, request_id } => {
                let result = ConnectionStats::from_value(data);
                let resolved = self.stats.resolve(request_id.as_deref(), result);
                RouteOutcome::Stats { resolved }
            }
            ServerMessage::Pong => {
                self.metrics.record_pong();
                RouteOutcome::Pong
            }
            ServerMessage::Error {
                message,
                subscription_id,
            } => {
                warn!(subscription_id = ?subscription_id, "Server error: {}", message);
                self.listeners.emit(ClientEvent::ServerError {
                    message,
                    subscription_id,
                });
                RouteOutcome::Forwarded
            }
            ServerMessage::Unknown => {
                warn!("Dropping frame with unrecognized type");
                RouteOutcome::Dropped
            }
        }
    }

    /// Deliver `event` to every matching subscription, returning how many
    /// handlers completed
    pub fn fan_out(&self, event: &Event) -> usize {
        let targets = self.registry.matching(event);
        let mut delivered = 0;

        for (subscription_id, handler) in targets {
            match panic::catch_unwind(AssertUnwindSafe(|| handler.on_update(event))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    error!(
                        subscription_id = %subscription_id,
                        entity_id = %event.entity_id,
                        "Subscription handler panicked: {}",
                        panic_message(payload.as_ref())
                    );
                }
            }
        }

        delivered
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::{EntityType, Event};
    use crate::core::registry::Subscription;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Fixture {
        registry: Arc<SubscriptionRegistry>,
        stats: Arc<StatsRequests>,
        listeners: Arc<Listeners>,
        metrics: Arc<AtomicMetrics>,
        router: MessageRouter,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(SubscriptionRegistry::new());
        let stats = Arc::new(StatsRequests::new());
        let listeners = Arc::new(Listeners::new());
        let metrics = Arc::new(AtomicMetrics::new());
        let router = MessageRouter::new(
            Arc::clone(&registry),
            Arc::clone(&stats),
            Arc::clone(&listeners),
            Arc::clone(&metrics),
        );
        Fixture {
            registry,
            stats,
            listeners,
            metrics,
            router,
        }
    }

    fn counting(query: &str, types: &[EntityType]) -> (Subscription, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let sub = Subscription::new(query, types.iter().copied(), move |_: &Event| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (sub, hits)
    }

    fn batch(entity_type: &str, queries: &[&str]) -> String {
        serde_json::json!({
            "type": "batch_update",
            "events": [{
                "event_type": "new_result",
                "entity_type": entity_type,
                "entity_id": "p-1",
                "affected_queries": queries,
            }]
        })
        .to_string()
    }

    #[test]
    fn test_matching_event_delivered_once() {
        let f = fixture();
        let (sub, hits) = counting("pothole", &[EntityType::Post]);
        f.registry.insert(sub);

        let outcome = f.router.route_text(&batch("post", &["Pothole repair on Elm Street"]));
        assert_eq!(outcome, RouteOutcome::Fanout { events: 1, deliveries: 1 });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_entity_type_mismatch_not_delivered() {
        let f = fixture();
        let (sub, hits) = counting("pothole", &[EntityType::Post]);
        f.registry.insert(sub);

        let outcome = f.router.route_text(&batch("user", &["pothole"]));
        assert_eq!(outcome, RouteOutcome::Fanout { events: 1, deliveries: 0 });
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panicking_handler_does_not_block_others() {
        let f = fixture();
        f.registry.insert(
            Subscription::new("road", [EntityType::Post], |_: &Event| panic!("subscriber bug"))
                .with_id("bad"),
        );
        let (good, hits) = counting("road", &[EntityType::Post]);
        f.registry.insert(good);

        let outcome = f.router.route_text(&batch("post", &["road closure"]));
        assert_eq!(outcome, RouteOutcome::Fanout { events: 1, deliveries: 1 });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_may_unsubscribe_itself() {
        let f = fixture();
        let registry = Arc::clone(&f.registry);
        f.registry.insert(
            Subscription::new("road", [EntityType::Post], move |_: &Event| {
                registry.remove("once");
            })
            .with_id("once"),
        );

        f.router.route_text(&batch("post", &["road"]));
        assert!(f.registry.is_empty());
    }

    #[test]
    fn test_bad_frames_are_dropped() {
        let f = fixture();
        assert_eq!(f.router.route_text("{not json"), RouteOutcome::Dropped);
        assert_eq!(f.router.route_text(r#"{"type":"mystery"}"#), RouteOutcome::Dropped);
        assert_eq!(f.router.route_binary(&[0xff, 0xfe, 0x00]), RouteOutcome::Dropped);
        assert_eq!(
            f.router.route_binary(br#"{"type":"pong"}"#),
            RouteOutcome::Pong
        );
    }

    #[test]
    fn test_confirmations_change_nothing() {
        let f = fixture();
        let (sub, _) = counting("a", &[EntityType::Post]);
        f.registry.insert(sub);
        let outcome = f
            .router
            .route_text(r#"{"type":"unsubscription_confirmed","subscription_id":"whatever"}"#);
        assert_eq!(outcome, RouteOutcome::Confirmation);
        assert_eq!(f.registry.len(), 1);
    }

    #[test]
    fn test_status_metrics_and_errors_reach_listeners() {
        let f = fixture();
        let rx = f.listeners.subscribe();
        let (sub, hits) = counting("bad query", &[EntityType::Post]);
        f.registry.insert(sub.with_id("s1"));

        f.router.route_text(r#"{"type":"connection_status","status":"healthy"}"#);
        f.router.route_text(r#"{"type":"current_metrics","data":{"active_users":5}}"#);
        f.router.route_text(r#"{"type":"error","message":"bad query","subscription_id":"s1"}"#);

        assert_eq!(
            rx.try_recv().unwrap(),
            ClientEvent::ConnectionStatus(serde_json::json!("healthy"))
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ClientEvent::CurrentMetrics(serde_json::json!({"active_users": 5}))
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ClientEvent::ServerError {
                message: "bad query".into(),
                subscription_id: Some("s1".into())
            }
        );
        // the named subscription stays registered
        assert_eq!(f.registry.len(), 1);
        assert!(f.registry.contains("s1"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stats_frame_resolves_pending_request() {
        let f = fixture();
        let (token, rx) = f.stats.register(Duration::from_secs(5));
        let frame = serde_json::json!({
            "type": "stats",
            "request_id": token,
            "data": {"total_connections": 3}
        })
        .to_string();

        assert_eq!(f.router.route_text(&frame), RouteOutcome::Stats { resolved: true });
        let stats = rx.await.unwrap().unwrap();
        assert_eq!(stats.total_connections, Some(3));

        assert_eq!(f.router.route_text(&frame), RouteOutcome::Stats { resolved: false });
    }

    #[test]
    fn test_pong_records_liveness() {
        let f = fixture();
        assert!(f.metrics.since_last_pong().is_none());
        f.router.route_text(r#"{"type":"pong"}"#);
        assert!(f.metrics.since_last_pong().is_some());
    }
}
