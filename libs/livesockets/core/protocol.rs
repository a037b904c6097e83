//! Wire protocol
//!
//! JSON text frames, each a flat object with a `type` discriminator:
//!
//! | direction | type | fields |
//! |---|---|---|
//! | out | `subscribe` | `subscription_id, query, entity_types, filters` |
//! | out | `unsubscribe` | `subscription_id` |
//! | out | `ping` | |
//! | out | `get_stats` | `request_id` |
//! | in | `batch_update` | `events` |
//! | in | `subscription_confirmed` / `unsubscription_confirmed` | `subscription_id` |
//! | in | `connection_status` | `status` |
//! | in | `current_metrics` | `data` |
//! | in | `stats` | `data`, `request_id`? |
//! | in | `pong` | |
//! | in | `error` | `message`, `subscription_id`? |

use crate::traits::{LiveSocketError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Optional server-side filters attached to a subscription
pub type Filters = BTreeMap<String, Value>;

/// Category of domain object an event concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Post,
    Comment,
    User,
    Representative,
    Petition,
    Poll,
    #[serde(other)]
    Other,
}

/// What happened to the entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    NewResult,
    UpdatedResult,
    RemovedResult,
    EngagementUpdate,
    Trending,
    SystemAlert,
    PlatformMetrics,
    #[serde(other)]
    Other,
}

/// One live update pushed by the server inside a `batch_update` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub entity_type: EntityType,
    #[serde(default, deserialize_with = "string_or_number")]
    pub entity_id: String,
    #[serde(default, alias = "data")]
    pub payload: Value,
    #[serde(default)]
    pub affected_queries: Vec<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

impl Event {
    pub fn new(
        event_type: EventType,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        affected_queries: Vec<String>,
    ) -> Self {
        Self {
            event_type,
            entity_type,
            entity_id: entity_id.into(),
            payload: Value::Null,
            affected_queries,
            timestamp: Utc::now(),
            relevance_score: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Entity ids arrive as strings from some endpoints and as integers from others
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number for entity_id, got {}",
            other
        ))),
    }
}

/// Frames sent by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Subscribe {
        subscription_id: String,
        query: String,
        entity_types: Vec<EntityType>,
        filters: Option<Filters>,
    },
    Unsubscribe {
        subscription_id: String,
    },
    Ping,
    GetStats {
        request_id: String,
    },
}

impl ClientFrame {
    /// The `type` discriminator, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ClientFrame::Subscribe { .. } => "subscribe",
            ClientFrame::Unsubscribe { .. } => "unsubscribe",
            ClientFrame::Ping => "ping",
            ClientFrame::GetStats { .. } => "get_stats",
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| LiveSocketError::Serialization(e.to_string()))
    }
}

/// Frames received from the server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    BatchUpdate {
        #[serde(default)]
        events: Vec<Event>,
    },
    SubscriptionConfirmed {
        subscription_id: String,
    },
    UnsubscriptionConfirmed {
        subscription_id: String,
    },
    ConnectionStatus {
        #[serde(default)]
        status: Value,
    },
    CurrentMetrics {
        #[serde(default)]
        data: Value,
    },
    Stats {
        #[serde(default)]
        data: Value,
        #[serde(default)]
        request_id: Option<String>,
    },
    Pong,
    Error {
        #[serde(default)]
        message: String,
        #[serde(default)]
        subscription_id: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// Parse one text frame
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| LiveSocketError::Protocol(e.to_string()))
    }
}

/// Server-reported connection statistics
///
/// Fields the server adds beyond the known ones are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_connections: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_subscriptions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ConnectionStats {
    pub fn from_value(data: Value) -> Result<Self> {
        if data.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(data).map_err(|e| LiveSocketError::Protocol(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscribe_frame_shape() {
        let frame = ClientFrame::Subscribe {
            subscription_id: "sub_1".into(),
            query: "pothole".into(),
            entity_types: vec![EntityType::Post, EntityType::Comment],
            filters: None,
        };
        let value: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "subscribe",
                "subscription_id": "sub_1",
                "query": "pothole",
                "entity_types": ["post", "comment"],
                "filters": null
            })
        );
    }

    #[test]
    fn test_ping_and_get_stats_frames() {
        assert_eq!(ClientFrame::Ping.to_json().unwrap(), r#"{"type":"ping"}"#);
        let value: Value = serde_json::from_str(
            &ClientFrame::GetStats { request_id: "stats_3".into() }.to_json().unwrap(),
        )
        .unwrap();
        assert_eq!(value["type"], "get_stats");
        assert_eq!(value["request_id"], "stats_3");
    }

    #[test]
    fn test_parse_batch_update() {
        let text = r#"{
            "type": "batch_update",
            "events": [{
                "event_type": "new_result",
                "entity_type": "post",
                "entity_id": 42,
                "data": {"title": "Pothole repair on Elm Street"},
                "affected_queries": ["pothole"],
                "timestamp": "2024-05-01T12:00:00Z",
                "relevance_score": 0.8
            }]
        }"#;

        match ServerMessage::parse(text).unwrap() {
            ServerMessage::BatchUpdate { events } => {
                assert_eq!(events.len(), 1);
                let event = &events[0];
                assert_eq!(event.event_type, EventType::NewResult);
                assert_eq!(event.entity_type, EntityType::Post);
                assert_eq!(event.entity_id, "42");
                assert_eq!(event.payload["title"], "Pothole repair on Elm Street");
                assert_eq!(event.relevance_score, Some(0.8));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_enum_values_fall_back_to_other() {
        let event: Event = serde_json::from_value(json!({
            "event_type": "brand_new_kind",
            "entity_type": "town_hall",
            "entity_id": "7"
        }))
        .unwrap();
        assert_eq!(event.event_type, EventType::Other);
        assert_eq!(event.entity_type, EntityType::Other);
        assert!(event.affected_queries.is_empty());
    }

    #[test]
    fn test_unknown_frame_type_is_not_an_error() {
        assert_eq!(
            ServerMessage::parse(r#"{"type":"shiny_new_frame","x":1}"#).unwrap(),
            ServerMessage::Unknown
        );
        assert_eq!(ServerMessage::parse(r#"{"type":"pong"}"#).unwrap(), ServerMessage::Pong);
    }

    #[test]
    fn test_malformed_frame_is_protocol_error() {
        assert!(matches!(
            ServerMessage::parse("not json"),
            Err(LiveSocketError::Protocol(_))
        ));
        assert!(matches!(
            ServerMessage::parse(r#"{"no_type": true}"#),
            Err(LiveSocketError::Protocol(_))
        ));
    }

    #[test]
    fn test_stats_payload_keeps_extra_fields() {
        let stats = ConnectionStats::from_value(json!({
            "total_connections": 12,
            "active_subscriptions": 4,
            "region": "eu-west"
        }))
        .unwrap();
        assert_eq!(stats.total_connections, Some(12));
        assert_eq!(stats.active_subscriptions, Some(4));
        assert_eq!(stats.extra["region"], "eu-west");
        assert_eq!(ConnectionStats::from_value(Value::Null).unwrap(), ConnectionStats::default());
    }
}
