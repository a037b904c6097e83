//! Live search results
//!
//! A thin layer over [`RealtimeClient`] bound to the search endpoint. Each
//! search the UI runs becomes one subscription; matching `new_result`,
//! `updated_result` and `removed_result` events reach its callback.

use livesockets::{
    EntityType, Event, Filters, RealtimeClient, Result, Subscription, SubscriptionInfo,
};
use tracing::info;

/// Realtime client for `/ws/search`
#[derive(Debug, Clone)]
pub struct SearchLiveClient {
    client: RealtimeClient,
}

impl SearchLiveClient {
    pub const DEFAULT_PATH: &'static str = "/ws/search";

    pub fn new(client: RealtimeClient) -> Self {
        Self { client }
    }

    pub fn connect(&self, credential: Option<String>) {
        self.client.connect(credential);
    }

    pub fn disconnect(&self) {
        self.client.disconnect();
    }

    /// Follow a search query live
    ///
    /// Returns the generated subscription id, or `None` if it could not be
    /// registered.
    pub fn subscribe_to_search<F>(
        &self,
        query: impl Into<String>,
        entity_types: impl IntoIterator<Item = EntityType>,
        filters: Option<Filters>,
        on_update: F,
    ) -> Option<String>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut subscription = Subscription::new(query, entity_types, on_update);
        if let Some(filters) = filters {
            subscription = subscription.with_filters(filters);
        }

        let id = subscription.id.clone();
        info!(subscription_id = %id, query = %subscription.query, "Following search");
        self.client.subscribe(subscription).then_some(id)
    }

    /// Like [`subscribe_to_search`](Self::subscribe_to_search), delivering
    /// events through a channel
    pub fn search_stream(
        &self,
        query: impl Into<String>,
        entity_types: impl IntoIterator<Item = EntityType>,
        filters: Option<Filters>,
    ) -> Option<(String, crossbeam_channel::Receiver<Event>)> {
        self.client.subscribe_channel(query, entity_types, filters)
    }

    pub fn unsubscribe(&self, subscription_id: &str) -> bool {
        self.client.unsubscribe(subscription_id)
    }

    pub fn searches(&self) -> Vec<SubscriptionInfo> {
        self.client.subscriptions()
    }

    /// Server statistics for this connection
    pub async fn get_stats(
        &self,
        timeout: std::time::Duration,
    ) -> Result<livesockets::ConnectionStats> {
        self.client.get_stats(timeout).await
    }

    /// The underlying connection, for state, metrics and event streams
    pub fn client(&self) -> &RealtimeClient {
        &self.client
    }
}
