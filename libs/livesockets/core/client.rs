use crate::core::config::ClientConfig;
use crate::core::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::core::heartbeat::HeartbeatMonitor;
use crate::core::listeners::{ClientEvent, Listeners};
use crate::core::protocol::{ClientFrame, ConnectionStats, EntityType, Event, Filters};
use crate::core::registry::{Subscription, SubscriptionInfo, SubscriptionRegistry};
use crate::core::router::MessageRouter;
use crate::core::stats::StatsRequests;
use crate::traits::*;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client metrics snapshot
#[derive(Debug, Clone)]
pub struct Metrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub reconnect_count: u64,
    pub connection_state: ConnectionState,
    pub active_subscriptions: usize,
    pub pending_stats: usize,
    pub since_last_pong: Option<Duration>,
}

/// How a session's socket loop ended
#[derive(Debug)]
enum SessionEnd {
    /// `disconnect()` was called
    Cancelled,
    /// The server closed the socket or the stream ended
    Closed(String),
    /// Transport error
    Failed(LiveSocketError),
}

/// Connection bookkeeping guarded by one lock
///
/// Holding the lock while touching the registry makes "is the socket open"
/// and "what has the server been told" change together, so a subscription
/// added concurrently with an open is sent exactly once.
#[derive(Default)]
struct Link {
    /// Generation of the current session; bumped by `connect` and `disconnect`
    session: u64,
    /// A session task is alive (connecting, open or waiting to retry)
    active: bool,
    manual_disconnect: bool,
    /// Consecutive failed attempts since the last successful open
    attempts: u32,
    cancel: Option<watch::Sender<bool>>,
    /// Present only while `Connected`
    outbound: Option<mpsc::UnboundedSender<ClientFrame>>,
}

struct Inner {
    config: ClientConfig,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    registry: Arc<SubscriptionRegistry>,
    stats: Arc<StatsRequests>,
    listeners: Arc<Listeners>,
    router: MessageRouter,
    link: Mutex<Link>,
}

/// Realtime connection manager
///
/// One logical connection multiplexing any number of subscriptions:
/// - Explicit `connect`/`disconnect` lifecycle with a single atomic state
/// - Exponential backoff reconnection with an attempt ceiling
/// - Heartbeat pings while connected
/// - Every registered subscription replayed on each successful open
/// - Inbound events fanned out to matching subscriptions
///
/// The handle is cheap to clone and every clone drives the same connection.
/// A running session keeps the client alive, so call [`disconnect`](Self::disconnect)
/// before dropping the last handle.
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<Inner>,
}

impl RealtimeClient {
    /// Create a disconnected client from configuration
    ///
    /// This is called by the builder's `build()` method.
    /// Use `livesockets::builder()` to create a client.
    pub(crate) fn new(config: ClientConfig) -> Self {
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Disconnected));
        let metrics = Arc::new(AtomicMetrics::new());
        let registry = Arc::new(SubscriptionRegistry::new());
        let stats = Arc::new(StatsRequests::new());
        let listeners = Arc::new(Listeners::new());
        let router = MessageRouter::new(
            Arc::clone(&registry),
            Arc::clone(&stats),
            Arc::clone(&listeners),
            Arc::clone(&metrics),
        );

        Self {
            inner: Arc::new(Inner {
                config,
                state,
                metrics,
                registry,
                stats,
                listeners,
                router,
                link: Mutex::new(Link::default()),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Open the connection in the background
    ///
    /// A no-op while a session is already alive (connecting, connected or
    /// waiting to retry). `credential`, when given, is used for every attempt
    /// of this session; otherwise the configured token provider is asked
    /// before each attempt.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self, credential: Option<String>) {
        let (session, cancel_rx) = {
            let mut link = self.inner.link.lock();
            if link.active {
                debug!(state = %self.inner.state.get(), "connect() ignored, session already active");
                return;
            }

            let (cancel_tx, cancel_rx) = watch::channel(false);
            link.session += 1;
            link.active = true;
            link.manual_disconnect = false;
            link.attempts = 0;
            link.cancel = Some(cancel_tx);
            self.inner.state.set(ConnectionState::Connecting);
            (link.session, cancel_rx)
        };

        info!(path = %self.inner.config.path, "Connecting realtime client");
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            run_session(inner, session, credential, cancel_rx).await;
        });
    }

    /// Tear the connection down
    ///
    /// Returns once local state is reset: state is `Disconnected`, the
    /// registry is empty, pending stats requests are rejected and the
    /// session (socket, heartbeat, retry timer) has been told to stop.
    pub fn disconnect(&self) {
        let (cancel, previous, cleared) = {
            let mut link = self.inner.link.lock();
            link.manual_disconnect = true;
            // invalidate the running session before it can observe the cancel
            link.session += 1;
            link.active = false;
            link.attempts = 0;
            link.outbound = None;
            let previous = self.inner.state.swap(ConnectionState::Disconnected);
            let cleared = self.inner.registry.clear();
            (link.cancel.take(), previous, cleared)
        };

        if let Some(cancel) = cancel {
            let _ = cancel.send(true);
        }

        let rejected = self
            .inner
            .stats
            .reject_all(LiveSocketError::ConnectionClosed("client disconnected".to_string()));

        info!(
            previous = %previous,
            subscriptions_cleared = cleared,
            stats_rejected = rejected,
            "Realtime client disconnected"
        );

        if previous != ConnectionState::Disconnected {
            self.inner.listeners.emit(ClientEvent::Disconnected);
        }
    }

    /// Check if connected
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.inner.state.is_connected()
    }

    /// Get current connection state
    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    /// Get current metrics
    pub fn metrics(&self) -> Metrics {
        let metrics = &self.inner.metrics;
        Metrics {
            messages_sent: metrics.messages_sent(),
            messages_received: metrics.messages_received(),
            reconnect_count: metrics.reconnect_count(),
            connection_state: self.inner.state.get(),
            active_subscriptions: self.inner.registry.len(),
            pending_stats: self.inner.stats.pending_count(),
            since_last_pong: metrics.since_last_pong(),
        }
    }

    /// Register a subscription
    ///
    /// The entry is stored whether or not the socket is open; when connected
    /// a `subscribe` frame goes out immediately, otherwise the next open
    /// replays it. Returns `false` if a subscription with the same id is
    /// already registered.
    pub fn subscribe(&self, subscription: Subscription) -> bool {
        let link = self.inner.link.lock();
        let frame = subscription.to_frame();
        let id = subscription.id.clone();

        if !self.inner.registry.insert(subscription) {
            warn!(subscription_id = %id, "Subscription id already registered");
            return false;
        }

        match link.outbound.as_ref() {
            Some(outbound) => {
                let _ = outbound.send(frame);
                debug!(subscription_id = %id, "Subscription sent");
            }
            None => debug!(subscription_id = %id, "Subscription queued until next open"),
        }
        true
    }

    /// Remove a subscription; `false` if the id is unknown
    pub fn unsubscribe(&self, subscription_id: &str) -> bool {
        let link = self.inner.link.lock();
        if self.inner.registry.remove(subscription_id).is_none() {
            debug!(subscription_id = %subscription_id, "Unsubscribe for unknown id");
            return false;
        }

        if let Some(outbound) = link.outbound.as_ref() {
            let _ = outbound.send(ClientFrame::Unsubscribe {
                subscription_id: subscription_id.to_string(),
            });
        }
        true
    }

    pub fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        self.inner.registry.list()
    }

    /// Subscribe with a channel instead of a callback
    ///
    /// Matching events are cloned into an unbounded channel owned by the
    /// caller, so a slow consumer never holds up dispatch. Returns the
    /// generated subscription id with the receiving end.
    pub fn subscribe_channel(
        &self,
        query: impl Into<String>,
        entity_types: impl IntoIterator<Item = EntityType>,
        filters: Option<Filters>,
    ) -> Option<(String, crossbeam_channel::Receiver<Event>)> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut subscription = Subscription::new(query, entity_types, move |event: &Event| {
            // receiver dropped: the owner stopped listening, nothing to do
            let _ = tx.send(event.clone());
        });
        if let Some(filters) = filters {
            subscription = subscription.with_filters(filters);
        }

        let id = subscription.id.clone();
        self.subscribe(subscription).then_some((id, rx))
    }

    /// Open a stream of lifecycle and server notifications
    ///
    /// Each call returns an independent receiver that sees every event
    /// emitted after it was created.
    pub fn events(&self) -> crossbeam_channel::Receiver<ClientEvent> {
        self.inner.listeners.subscribe()
    }

    /// Ask the server for connection statistics
    ///
    /// Fails immediately with `NotConnected` (and sends nothing) unless the
    /// socket is open; fails with `Timeout` if no `stats` frame arrives
    /// within `timeout`.
    pub async fn get_stats(&self, timeout: Duration) -> Result<ConnectionStats> {
        let (token, rx) = {
            let link = self.inner.link.lock();
            let Some(outbound) = link.outbound.as_ref() else {
                return Err(LiveSocketError::NotConnected);
            };

            let (token, rx) = self.inner.stats.register(timeout);
            let frame = ClientFrame::GetStats {
                request_id: token.clone(),
            };
            if outbound.send(frame).is_err() {
                self.inner.stats.cancel(&token);
                return Err(LiveSocketError::NotConnected);
            }
            (token, rx)
        };

        debug!(request_id = %token, "Stats requested");
        self.inner.stats.wait(&token, rx, timeout).await
    }

    /// [`get_stats`](Self::get_stats) with the configured default timeout
    pub async fn stats(&self) -> Result<ConnectionStats> {
        self.get_stats(self.inner.config.default_stats_timeout).await
    }
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("path", &self.inner.config.path)
            .field("state", &self.inner.state.get())
            .field("subscriptions", &self.inner.registry.len())
            .finish()
    }
}

impl Inner {
    /// Resolve the credential and perform the WebSocket handshake
    async fn open_socket(&self, credential: Option<&str>) -> Result<WsStream> {
        let token = match (credential, self.config.token_provider.as_ref()) {
            (Some(credential), _) => Some(credential.to_string()),
            (None, Some(provider)) => provider.bearer_token().await.map_err(|e| match e {
                LiveSocketError::AuthenticationFailed(_) => e,
                other => LiveSocketError::AuthenticationFailed(other.to_string()),
            })?,
            (None, None) => None,
        };

        let url = self.config.endpoint(token.as_deref())?;
        debug!(
            host = url.host_str().unwrap_or_default(),
            path = url.path(),
            authenticated = token.is_some(),
            "Opening realtime socket"
        );

        match tokio::time::timeout(self.config.connect_timeout, connect_async(url.as_str())).await {
            Ok(Ok((stream, _response))) => Ok(stream),
            Ok(Err(e)) => Err(LiveSocketError::WebSocket(e.to_string())),
            Err(_) => Err(LiveSocketError::Timeout(format!(
                "handshake took longer than {:?}",
                self.config.connect_timeout
            ))),
        }
    }

    /// Flip to `Connected` and replay the registry into the new socket
    ///
    /// Returns `false` when the session was superseded in the meantime.
    fn on_open(&self, session: u64, outbound: mpsc::UnboundedSender<ClientFrame>) -> bool {
        let mut link = self.link.lock();
        if link.session != session || link.manual_disconnect {
            return false;
        }

        self.state.set(ConnectionState::Connected);
        link.attempts = 0;

        let frames = self.registry.replay_frames();
        let replayed = frames.len();
        for frame in frames {
            let _ = outbound.send(frame);
        }
        link.outbound = Some(outbound);
        drop(link);

        info!(replayed, "Realtime connection open");
        self.listeners.emit(ClientEvent::Connected);
        true
    }

    fn on_error(&self, session: u64, err: &LiveSocketError) {
        {
            let mut link = self.link.lock();
            if link.session != session || link.manual_disconnect {
                return;
            }
            link.outbound = None;
            if self.state.get() != ConnectionState::Reconnecting {
                self.state.set(ConnectionState::Error);
            }
        }

        error!("Realtime connection error: {}", err);
        self.listeners.emit(ClientEvent::Error(err.to_string()));
    }

    /// Decide what follows a lost connection
    ///
    /// Returns the delay before the next attempt, or `None` when the session
    /// must end (manual disconnect, superseded, or attempts exhausted).
    fn on_close(&self, session: u64, was_open: bool) -> Option<Duration> {
        let mut link = self.link.lock();
        if link.session != session || link.manual_disconnect {
            return None;
        }
        link.outbound = None;

        let rejected = self
            .stats
            .reject_all(LiveSocketError::ConnectionClosed("connection lost".to_string()));
        if rejected > 0 {
            debug!(rejected, "Pending stats requests rejected");
        }

        let policy = self.config.reconnect_policy.as_ref();
        let attempt = link.attempts + 1;

        if !policy.should_reconnect(attempt) {
            let attempts = link.attempts;
            self.state.set(ConnectionState::Error);
            link.active = false;
            link.cancel = None;
            drop(link);

            if was_open {
                self.listeners.emit(ClientEvent::Disconnected);
            }
            warn!(attempts, "Reconnection attempts exhausted, giving up until next connect()");
            self.listeners.emit(ClientEvent::ReconnectExhausted { attempts });
            return None;
        }

        link.attempts = attempt;
        let delay = policy.delay_for_attempt(attempt);
        self.state.set(ConnectionState::Reconnecting);
        self.metrics.increment_reconnects();
        drop(link);

        if was_open {
            self.listeners.emit(ClientEvent::Disconnected);
        }
        info!("Reconnecting in {:?} (attempt {})", delay, attempt);
        self.listeners.emit(ClientEvent::Reconnecting { attempt, delay });
        Some(delay)
    }

    /// `Reconnecting → Connecting` when the retry timer fires
    fn begin_retry(&self, session: u64) -> bool {
        let link = self.link.lock();
        if link.session != session || link.manual_disconnect {
            return false;
        }
        self.state.set(ConnectionState::Connecting);
        true
    }

    fn finish_session(&self, session: u64) {
        let mut link = self.link.lock();
        if link.session == session {
            link.active = false;
            link.outbound = None;
            link.cancel = None;
        }
    }

    fn heartbeat(&self, outbound: mpsc::UnboundedSender<ClientFrame>) -> Option<HeartbeatMonitor> {
        let interval = self.config.heartbeat_interval?;
        let state = Arc::clone(&self.state);
        let mut monitor = HeartbeatMonitor::new(
            interval,
            move || state.is_connected(),
            move |frame| outbound.send(frame).is_ok(),
        );
        monitor.start();
        Some(monitor)
    }
}

/// Resolves once `disconnect()` signals (or the signal is gone)
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|stop| *stop).await;
}

/// One session: connect, serve, and retry until told to stop or exhausted
async fn run_session(
    inner: Arc<Inner>,
    session: u64,
    credential: Option<String>,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        let opened = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => break,
            opened = inner.open_socket(credential.as_deref()) => opened,
        };

        let was_open = match opened {
            Ok(stream) => {
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                if !inner.on_open(session, outbound_tx.clone()) {
                    debug!("Session superseded during handshake, dropping socket");
                    break;
                }

                let mut heartbeat = inner.heartbeat(outbound_tx);
                let end = drive(&inner, stream, outbound_rx, &mut cancel).await;
                if let Some(heartbeat) = heartbeat.as_mut() {
                    heartbeat.stop();
                }

                match end {
                    SessionEnd::Cancelled => break,
                    SessionEnd::Closed(reason) => {
                        warn!("Realtime connection closed: {}", reason);
                    }
                    SessionEnd::Failed(e) => inner.on_error(session, &e),
                }
                true
            }
            Err(e) => {
                inner.on_error(session, &e);
                false
            }
        };

        let Some(delay) = inner.on_close(session, was_open) else {
            break;
        };

        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => break,
            _ = tokio::time::sleep(delay) => {}
        }

        if !inner.begin_retry(session) {
            break;
        }
    }

    inner.finish_session(session);
    debug!(session, "Realtime session task exiting");
}

/// Pump frames both ways until the socket goes away or the session is cancelled
async fn drive(
    inner: &Inner,
    stream: WsStream,
    mut outbound: mpsc::UnboundedReceiver<ClientFrame>,
    cancel: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            biased;

            _ = cancelled(cancel) => {
                debug!("Session cancelled, closing socket");
                let _ = write.send(Message::Close(None)).await;
                let _ = write.close().await;
                return SessionEnd::Cancelled;
            }

            Some(frame) = outbound.recv() => {
                let text = match frame.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        error!(kind = frame.kind(), "Failed to encode frame: {}", e);
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(text)).await {
                    return SessionEnd::Failed(LiveSocketError::WebSocket(e.to_string()));
                }
                inner.metrics.increment_sent();
                debug!(kind = frame.kind(), "Frame sent");
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        inner.metrics.increment_received();
                        inner.router.route_text(&text);
                    }
                    Some(Ok(Message::Binary(data))) => {
                        inner.metrics.increment_received();
                        inner.router.route_binary(&data);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| format!("{} {}", f.code, f.reason))
                            .unwrap_or_else(|| "no close frame".to_string());
                        return SessionEnd::Closed(reason);
                    }
                    // protocol-level ping/pong are answered by tungstenite
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return SessionEnd::Failed(LiveSocketError::WebSocket(e.to_string()));
                    }
                    None => return SessionEnd::Closed("stream ended".to_string()),
                }
            }
        }
    }
}
