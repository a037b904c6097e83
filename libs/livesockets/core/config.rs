use crate::traits::*;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Configuration for a RealtimeClient
///
/// This struct holds everything needed to open and keep a realtime
/// connection. It is built using the type-state builder pattern.
#[derive(Clone)]
pub struct ClientConfig {
    /// API base URL (http(s):// or ws(s)://)
    pub(crate) base_url: String,

    /// Endpoint path appended to the base URL, e.g. `/ws/search`
    pub(crate) path: String,

    /// Optional source of the bearer credential
    pub(crate) token_provider: Option<Arc<dyn TokenProvider>>,

    /// Ping interval; `None` disables the heartbeat
    pub(crate) heartbeat_interval: Option<Duration>,

    /// Reconnection policy
    pub(crate) reconnect_policy: Arc<dyn ReconnectionPolicy>,

    /// Upper bound on the WebSocket handshake
    pub(crate) connect_timeout: Duration,

    /// Timeout used by `stats()`
    pub(crate) default_stats_timeout: Duration,
}

impl ClientConfig {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn has_token_provider(&self) -> bool {
        self.token_provider.is_some()
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat_interval
    }

    pub fn reconnect_policy(&self) -> &dyn ReconnectionPolicy {
        self.reconnect_policy.as_ref()
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn default_stats_timeout(&self) -> Duration {
        self.default_stats_timeout
    }

    /// The socket URL for one connection attempt
    pub fn endpoint(&self, credential: Option<&str>) -> Result<Url> {
        derive_endpoint(&self.base_url, &self.path, credential)
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("path", &self.path)
            .field("has_token_provider", &self.has_token_provider())
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("max_attempts", &self.reconnect_policy.max_attempts())
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Build the socket URL from the API base URL
///
/// `http` becomes `ws`, `https` becomes `wss`; any path, query or fragment
/// on the base is replaced. A non-empty credential is appended as the
/// `token` query parameter.
pub fn derive_endpoint(base_url: &str, path: &str, credential: Option<&str>) -> Result<Url> {
    let mut url = Url::parse(base_url.trim())
        .map_err(|e| LiveSocketError::Configuration(format!("invalid base URL {:?}: {}", base_url, e)))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(LiveSocketError::Configuration(format!(
                "unsupported URL scheme: {}",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| LiveSocketError::Configuration(format!("cannot use scheme {} for {}", scheme, base_url)))?;

    if path.starts_with('/') {
        url.set_path(path);
    } else {
        url.set_path(&format!("/{}", path));
    }
    url.set_query(None);
    url.set_fragment(None);

    if let Some(token) = credential.filter(|t| !t.is_empty()) {
        url.query_pairs_mut().append_pair("token", token);
    }

    Ok(url)
}
