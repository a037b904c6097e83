pub mod states;

use crate::core::client::RealtimeClient;
use crate::core::config::{derive_endpoint, ClientConfig};
use crate::core::heartbeat::HeartbeatMonitor;
use crate::traits::*;
use states::*;
use std::sync::Arc;
use std::time::Duration;

/// Type-state builder for RealtimeClient
///
/// The base URL is required and enforced by the type system; everything
/// else has a default:
///
/// | setting | default |
/// |---|---|
/// | path | `/ws` |
/// | heartbeat | every 30s |
/// | reconnect policy | [`ExponentialBackoff::default`] (1s, 30s cap, 5 attempts) |
/// | connect timeout | 10s |
/// | stats timeout | 5s |
pub struct RealtimeClientBuilder<U>
where
    U: UrlState,
{
    _state: TypeState<U>,
    base_url: Option<String>,
    path: String,
    token_provider: Option<Arc<dyn TokenProvider>>,
    heartbeat_interval: Option<Duration>,
    reconnect_policy: Option<Arc<dyn ReconnectionPolicy>>,
    connect_timeout: Duration,
    stats_timeout: Duration,
}

impl RealtimeClientBuilder<NoUrl> {
    pub const DEFAULT_PATH: &'static str = "/ws";
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_STATS_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            base_url: None,
            path: Self::DEFAULT_PATH.to_string(),
            token_provider: None,
            heartbeat_interval: Some(HeartbeatMonitor::DEFAULT_INTERVAL),
            reconnect_policy: None,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            stats_timeout: Self::DEFAULT_STATS_TIMEOUT,
        }
    }

    /// API base URL, e.g. `https://api.example.org`
    pub fn base_url(self, url: impl Into<String>) -> RealtimeClientBuilder<HasUrl> {
        RealtimeClientBuilder {
            _state: TypeState::new(),
            base_url: Some(url.into()),
            path: self.path,
            token_provider: self.token_provider,
            heartbeat_interval: self.heartbeat_interval,
            reconnect_policy: self.reconnect_policy,
            connect_timeout: self.connect_timeout,
            stats_timeout: self.stats_timeout,
        }
    }
}

impl Default for RealtimeClientBuilder<NoUrl> {
    fn default() -> Self {
        Self::new()
    }
}

// Optional configuration methods
impl<U> RealtimeClientBuilder<U>
where
    U: UrlState,
{
    /// Endpoint path on the server, e.g. `/ws/search`
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Consulted on every connection attempt when `connect` gets no credential
    pub fn token_provider(mut self, provider: impl TokenProvider + 'static) -> Self {
        self.token_provider = Some(Arc::new(provider));
        self
    }

    /// Shorthand for a fixed bearer token
    pub fn token(self, token: impl Into<String>) -> Self {
        self.token_provider(StaticToken::new(token))
    }

    pub fn heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    pub fn no_heartbeat(mut self) -> Self {
        self.heartbeat_interval = None;
        self
    }

    pub fn reconnect_policy(mut self, policy: impl ReconnectionPolicy + 'static) -> Self {
        self.reconnect_policy = Some(Arc::new(policy));
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Timeout used by [`RealtimeClient::stats`]
    pub fn stats_timeout(mut self, timeout: Duration) -> Self {
        self.stats_timeout = timeout;
        self
    }
}

// Build method - only available once the base URL is set
impl RealtimeClientBuilder<HasUrl> {
    /// Validate the configuration and create a disconnected client
    ///
    /// No socket is opened until [`RealtimeClient::connect`].
    pub fn build(self) -> Result<RealtimeClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| LiveSocketError::Configuration("base URL must be set".to_string()))?;

        if self.heartbeat_interval == Some(Duration::ZERO) {
            return Err(LiveSocketError::Configuration(
                "heartbeat interval must be positive".to_string(),
            ));
        }

        // fail fast on a URL that can never produce an endpoint
        derive_endpoint(&base_url, &self.path, None)?;

        let reconnect_policy = self
            .reconnect_policy
            .unwrap_or_else(|| Arc::new(ExponentialBackoff::default()));

        let config = ClientConfig {
            base_url,
            path: self.path,
            token_provider: self.token_provider,
            heartbeat_interval: self.heartbeat_interval,
            reconnect_policy,
            connect_timeout: self.connect_timeout,
            default_stats_timeout: self.stats_timeout,
        };

        Ok(RealtimeClient::new(config))
    }
}
