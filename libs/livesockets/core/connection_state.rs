//! Lock-free connection state and counters
//!
//! Reads never block. Writes of the state are serialized by the client's
//! link lock so that a transition and its side effects are observed together.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

/// Lifecycle state of the realtime connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// No session; the initial state and the state after `disconnect()`
    Disconnected = 0,
    /// Socket handshake in progress
    Connecting = 1,
    /// Socket open, frames flowing
    Connected = 2,
    /// Waiting for the backoff delay before the next attempt
    Reconnecting = 3,
    /// Transport failure, or reconnection attempts exhausted
    Error = 4,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Reconnecting,
            4 => ConnectionState::Error,
            _ => ConnectionState::Disconnected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic holder for a [`ConnectionState`]
#[derive(Debug)]
pub struct AtomicConnectionState {
    inner: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            inner: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: ConnectionState) {
        self.inner.store(state as u8, Ordering::Release);
    }

    /// Store `state` and return the previous value
    #[inline]
    pub fn swap(&self, state: ConnectionState) -> ConnectionState {
        ConnectionState::from_u8(self.inner.swap(state as u8, Ordering::AcqRel))
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }

    /// True while a handshake is in flight or a retry is pending
    #[inline]
    pub fn is_connecting(&self) -> bool {
        matches!(
            self.get(),
            ConnectionState::Connecting | ConnectionState::Reconnecting
        )
    }

    #[inline]
    pub fn is_disconnected(&self) -> bool {
        self.get() == ConnectionState::Disconnected
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.get() == ConnectionState::Error
    }
}

impl Default for AtomicConnectionState {
    fn default() -> Self {
        Self::new(ConnectionState::Disconnected)
    }
}

/// Connection counters shared between the client handle and its session task
#[derive(Debug)]
pub struct AtomicMetrics {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    reconnect_count: AtomicU64,
    epoch: Instant,
    /// Last pong, in ms since `epoch` plus one (0 = never)
    last_pong_ms: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self {
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            reconnect_count: AtomicU64::new(0),
            epoch: Instant::now(),
            last_pong_ms: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn increment_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_reconnects(&self) {
        self.reconnect_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pong(&self) {
        let ms = self.epoch.elapsed().as_millis() as u64;
        self.last_pong_ms.store(ms + 1, Ordering::Release);
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnect_count.load(Ordering::Relaxed)
    }

    /// Time since the last `pong` frame, if one was ever received
    pub fn since_last_pong(&self) -> Option<Duration> {
        match self.last_pong_ms.load(Ordering::Acquire) {
            0 => None,
            stamp => {
                let now = self.epoch.elapsed().as_millis() as u64;
                Some(Duration::from_millis(now.saturating_sub(stamp - 1)))
            }
        }
    }
}

impl Default for AtomicMetrics {
    fn default() -> Self {
        Self::new()
    }
}
