//! Common test utilities for LiveSockets integration tests
//!
//! A scripted realtime server: it records every frame the client sends,
//! answers `ping` and `get_stats` the way the production server does, and
//! lets a test push frames or close the current connection.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use livesockets::ClientEvent;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// A client frame as seen by the server
#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    /// 1-based index of the connection it arrived on
    pub connection: usize,
    pub frame: Value,
}

impl ReceivedFrame {
    pub fn kind(&self) -> &str {
        self.frame["type"].as_str().unwrap_or_default()
    }
}

enum ServerAction {
    Send(String),
    Close,
}

#[derive(Default)]
struct Shared {
    received: Mutex<Vec<ReceivedFrame>>,
    request_uris: Mutex<Vec<String>>,
    connections: AtomicUsize,
    current: Mutex<Option<mpsc::UnboundedSender<ServerAction>>>,
    silent_stats: AtomicBool,
}

/// Mock realtime server on an ephemeral local port
pub struct MockRealtimeServer {
    pub addr: SocketAddr,
    shared: Arc<Shared>,
    shutdown: Arc<Notify>,
}

impl MockRealtimeServer {
    /// Create and start a new mock server
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Shared::default());
        let shutdown = Arc::new(Notify::new());

        let accept_shared = Arc::clone(&shared);
        let accept_shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let shared = Arc::clone(&accept_shared);
                                let shutdown = Arc::clone(&accept_shutdown);
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, shared, shutdown).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = accept_shutdown.notified() => break,
                }
            }
        });

        Self {
            addr,
            shared,
            shutdown,
        }
    }

    async fn handle_connection(stream: TcpStream, shared: Arc<Shared>, shutdown: Arc<Notify>) {
        let uris = Arc::clone(&shared);
        let callback = move |request: &Request,
                             response: Response|
              -> Result<Response, ErrorResponse> {
            uris.request_uris.lock().push(request.uri().to_string());
            Ok(response)
        };

        let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let connection = shared.connections.fetch_add(1, Ordering::SeqCst) + 1;
        let (action_tx, mut action_rx) = mpsc::unbounded_channel();
        *shared.current.lock() = Some(action_tx);

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                Some(action) = action_rx.recv() => {
                    match action {
                        ServerAction::Send(text) => {
                            if write.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        ServerAction::Close => {
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                    }
                }
                msg = read.next() => {
                    let text = match msg {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => continue,
                    };
                    let frame: Value = match serde_json::from_str(&text) {
                        Ok(frame) => frame,
                        Err(_) => continue,
                    };

                    let reply = match frame["type"].as_str() {
                        Some("ping") => Some(json!({"type": "pong"})),
                        Some("get_stats") if !shared.silent_stats.load(Ordering::SeqCst) => {
                            let active = shared
                                .received
                                .lock()
                                .iter()
                                .filter(|r| r.connection == connection && r.kind() == "subscribe")
                                .count();
                            Some(json!({
                                "type": "stats",
                                "request_id": frame["request_id"].clone(),
                                "data": {
                                    "total_connections": connection,
                                    "active_subscriptions": active,
                                }
                            }))
                        }
                        Some("subscribe") => Some(json!({
                            "type": "subscription_confirmed",
                            "subscription_id": frame["subscription_id"].clone(),
                        })),
                        _ => None,
                    };

                    shared.received.lock().push(ReceivedFrame { connection, frame });

                    if let Some(reply) = reply {
                        if write.send(Message::Text(reply.to_string())).await.is_err() {
                            break;
                        }
                    }
                }
                _ = shutdown.notified() => break,
            }
        }
    }

    /// Base URL for the client builder
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of WebSocket handshakes accepted so far
    pub fn connection_count(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    pub fn frames(&self) -> Vec<ReceivedFrame> {
        self.shared.received.lock().clone()
    }

    pub fn frames_of(&self, kind: &str, connection: usize) -> Vec<Value> {
        self.shared
            .received
            .lock()
            .iter()
            .filter(|r| r.connection == connection && r.kind() == kind)
            .map(|r| r.frame.clone())
            .collect()
    }

    pub fn request_uris(&self) -> Vec<String> {
        self.shared.request_uris.lock().clone()
    }

    /// Stop answering `get_stats`
    pub fn silence_stats(&self) {
        self.shared.silent_stats.store(true, Ordering::SeqCst);
    }

    /// Push a frame to the most recent connection
    pub fn push(&self, frame: Value) -> bool {
        match self.shared.current.lock().as_ref() {
            Some(tx) => tx.send(ServerAction::Send(frame.to_string())).is_ok(),
            None => false,
        }
    }

    /// Close the most recent connection from the server side
    pub fn close_current(&self) -> bool {
        match self.shared.current.lock().take() {
            Some(tx) => tx.send(ServerAction::Close).is_ok(),
            None => false,
        }
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockRealtimeServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses
pub async fn eventually<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Run `future` with a generous upper bound so a hung test fails instead of stalling
pub async fn bounded<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(10), future)
        .await
        .expect("test step timed out")
}

/// Move everything currently queued on `events` into `seen`
pub fn drain(events: &crossbeam_channel::Receiver<ClientEvent>, seen: &mut Vec<ClientEvent>) {
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
}
