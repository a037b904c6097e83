//! Subscription registry and fan-out matching

use crate::core::protocol::{ClientFrame, EntityType, Event, Filters};
use crate::traits::EventHandler;
use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Generate a subscription id unique for the lifetime of the process
pub fn generate_subscription_id() -> String {
    let seq = NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed);
    format!("sub_{}_{}", Utc::now().timestamp_millis(), seq)
}

/// True when either query contains the other, ignoring case
///
/// A broad subscription ("road") matches a specific affected query
/// ("road construction on Main Street") and vice versa.
pub fn queries_overlap(subscription_query: &str, affected_query: &str) -> bool {
    let subscription_query = subscription_query.to_lowercase();
    let affected_query = affected_query.to_lowercase();
    affected_query.contains(&subscription_query) || subscription_query.contains(&affected_query)
}

/// A caller-registered interest in live events
#[derive(Clone)]
pub struct Subscription {
    pub id: String,
    pub query: String,
    pub entity_types: BTreeSet<EntityType>,
    pub filters: Option<Filters>,
    handler: Arc<dyn EventHandler>,
}

impl Subscription {
    /// Create a subscription with a generated id
    pub fn new<H>(
        query: impl Into<String>,
        entity_types: impl IntoIterator<Item = EntityType>,
        handler: H,
    ) -> Self
    where
        H: EventHandler,
    {
        Self {
            id: generate_subscription_id(),
            query: query.into(),
            entity_types: entity_types.into_iter().collect(),
            filters: None,
            handler: Arc::new(handler),
        }
    }

    /// Use a caller-supplied id instead of the generated one
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Fan-out predicate
    ///
    /// The event's entity type must be one of ours, and at least one of its
    /// affected queries must overlap our query.
    pub fn matches(&self, event: &Event) -> bool {
        self.entity_types.contains(&event.entity_type)
            && event
                .affected_queries
                .iter()
                .any(|affected| queries_overlap(&self.query, affected))
    }

    /// The `subscribe` frame announcing this subscription to the server
    pub fn to_frame(&self) -> ClientFrame {
        ClientFrame::Subscribe {
            subscription_id: self.id.clone(),
            query: self.query.clone(),
            entity_types: self.entity_types.iter().copied().collect(),
            filters: self.filters.clone(),
        }
    }

    pub fn info(&self) -> SubscriptionInfo {
        SubscriptionInfo {
            id: self.id.clone(),
            query: self.query.clone(),
            entity_types: self.entity_types.iter().copied().collect(),
            filters: self.filters.clone(),
        }
    }

    pub(crate) fn handler(&self) -> Arc<dyn EventHandler> {
        Arc::clone(&self.handler)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("query", &self.query)
            .field("entity_types", &self.entity_types)
            .field("filters", &self.filters)
            .finish_non_exhaustive()
    }
}

/// Snapshot of a registered subscription, without its callback
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionInfo {
    pub id: String,
    pub query: String,
    pub entity_types: Vec<EntityType>,
    pub filters: Option<Filters>,
}

/// In-memory table of live subscriptions keyed by id
///
/// The table is the source of truth for what the server should know about:
/// it is replayed in full on every successful open.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: RwLock<HashMap<String, Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a subscription; `false` if its id is already live
    pub fn insert(&self, subscription: Subscription) -> bool {
        let mut entries = self.entries.write();
        if entries.contains_key(&subscription.id) {
            return false;
        }
        entries.insert(subscription.id.clone(), subscription);
        true
    }

    pub fn remove(&self, id: &str) -> Option<Subscription> {
        self.entries.write().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry, returning how many were removed
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write();
        let count = entries.len();
        entries.clear();
        count
    }

    /// Subscriptions ordered by id
    pub fn list(&self) -> Vec<SubscriptionInfo> {
        let mut infos: Vec<SubscriptionInfo> =
            self.entries.read().values().map(Subscription::info).collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// `subscribe` frames for every live entry
    pub fn replay_frames(&self) -> Vec<ClientFrame> {
        self.entries.read().values().map(Subscription::to_frame).collect()
    }

    /// Handlers of every subscription matching `event`
    ///
    /// Handlers are cloned out so callbacks run without the table locked and
    /// may themselves subscribe or unsubscribe.
    pub fn matching(&self, event: &Event) -> Vec<(String, Arc<dyn EventHandler>)> {
        self.entries
            .read()
            .values()
            .filter(|sub| sub.matches(event))
            .map(|sub| (sub.id.clone(), sub.handler()))
            .collect()
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("entries", &self.len())
            .finish()
    }
}
