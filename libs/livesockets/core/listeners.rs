//! Typed lifecycle and server notifications
//!
//! Every call to [`Listeners::subscribe`] opens its own unbounded crossbeam
//! channel, so each consumer sees every event. Channels whose receiver was
//! dropped are pruned on the next emit.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde_json::Value;
use std::time::Duration;

/// Notifications emitted by the client
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Socket opened and subscriptions replayed
    Connected,
    /// The connection was lost or torn down by `disconnect()`
    Disconnected,
    /// A reconnection attempt was scheduled
    Reconnecting { attempt: u32, delay: Duration },
    /// Transport or handshake error
    Error(String),
    /// The attempt ceiling was reached; real-time features are unavailable
    /// until the next explicit `connect`
    ReconnectExhausted { attempts: u32 },
    /// `connection_status` frame
    ConnectionStatus(Value),
    /// `current_metrics` frame
    CurrentMetrics(Value),
    /// `error` frame; the registry is left untouched
    ServerError {
        message: String,
        subscription_id: Option<String>,
    },
}

#[derive(Default)]
pub struct Listeners {
    senders: Mutex<Vec<Sender<ClientEvent>>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new event stream
    pub fn subscribe(&self) -> Receiver<ClientEvent> {
        let (tx, rx) = unbounded();
        self.senders.lock().push(tx);
        rx
    }

    /// Deliver `event` to every live stream
    pub fn emit(&self, event: ClientEvent) {
        self.senders.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.senders.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.lock().is_empty()
    }
}
