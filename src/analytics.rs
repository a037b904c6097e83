//! Live platform analytics
//!
//! Metric updates reach the client two ways: `platform_metrics` events
//! inside `batch_update` frames (tagged with the `platform_metrics`
//! affected query) and standalone `current_metrics` frames.

use crossbeam_channel::Receiver;
use livesockets::{
    ClientEvent, ConnectionStats, EntityType, Event, EventType, RealtimeClient, Result,
    Subscription,
};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Affected query the server tags metric events with
pub const METRICS_QUERY: &str = "platform_metrics";

/// Realtime client for `/ws/analytics`
#[derive(Debug, Clone)]
pub struct AnalyticsLiveClient {
    client: RealtimeClient,
}

impl AnalyticsLiveClient {
    pub const DEFAULT_PATH: &'static str = "/ws/analytics";

    pub fn new(client: RealtimeClient) -> Self {
        Self { client }
    }

    pub fn connect(&self, credential: Option<String>) {
        self.client.connect(credential);
    }

    pub fn disconnect(&self) {
        self.client.disconnect();
    }

    /// Receive `platform_metrics` events
    ///
    /// Other event types routed to the same subscription are ignored.
    pub fn subscribe_to_metrics<F>(&self, on_metrics: F) -> Option<String>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let subscription = Subscription::new(METRICS_QUERY, [EntityType::Other], move |event: &Event| {
            if event.event_type == EventType::PlatformMetrics {
                on_metrics(event);
            } else {
                debug!(event_type = ?event.event_type, "Ignoring non-metrics event");
            }
        });

        let id = subscription.id.clone();
        self.client.subscribe(subscription).then_some(id)
    }

    pub fn unsubscribe(&self, subscription_id: &str) -> bool {
        self.client.unsubscribe(subscription_id)
    }

    /// A stream of `current_metrics` payloads
    pub fn metrics_stream(&self) -> MetricsStream {
        MetricsStream {
            events: self.client.events(),
        }
    }

    pub async fn get_stats(&self, timeout: Duration) -> Result<ConnectionStats> {
        self.client.get_stats(timeout).await
    }

    pub fn client(&self) -> &RealtimeClient {
        &self.client
    }
}

/// `current_metrics` payloads filtered out of the client's event stream
pub struct MetricsStream {
    events: Receiver<ClientEvent>,
}

impl MetricsStream {
    /// Next payload already received, if any
    pub fn try_next(&self) -> Option<Value> {
        self.events.try_iter().find_map(metrics_payload)
    }

    /// Every payload received so far
    pub fn drain(&self) -> Vec<Value> {
        self.events.try_iter().filter_map(metrics_payload).collect()
    }

    /// Block the current thread until a payload arrives or `timeout` elapses
    ///
    /// Not for use on a runtime worker thread.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Value> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let event = self.events.recv_deadline(deadline).ok()?;
            if let Some(payload) = metrics_payload(event) {
                return Some(payload);
            }
        }
    }
}

fn metrics_payload(event: ClientEvent) -> Option<Value> {
    match event {
        ClientEvent::CurrentMetrics(payload) => Some(payload),
        _ => None,
    }
}
