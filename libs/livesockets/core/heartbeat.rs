//! Heartbeat mechanism for realtime connections
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  Heartbeat Task     │
//! │  (Tokio spawn)      │
//! │                     │
//! │  Every interval:    │
//! │  1. Wait for tick   │
//! │  2. connected? ─────┼──no──> skip
//! │  3. send(ping) ─────┼──> outbound queue ──> socket
//! └─────────────────────┘
//! ```
//!
//! The heartbeat keeps proxies and load balancers from closing an idle
//! connection. Failure detection stays with the socket's own close and
//! error events; a `pong` only refreshes the liveness timestamp.

use crate::core::protocol::ClientFrame;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

type ConnectedProbe = Arc<dyn Fn() -> bool + Send + Sync>;
type FrameSink = Arc<dyn Fn(ClientFrame) -> bool + Send + Sync>;

/// Periodic `ping` issuer
///
/// Every `start()` is paired with a `stop()`; dropping the monitor stops it.
pub struct HeartbeatMonitor {
    interval: Duration,
    is_connected: ConnectedProbe,
    send: FrameSink,
    task: Option<(JoinHandle<()>, oneshot::Sender<()>)>,
}

impl HeartbeatMonitor {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

    /// # Arguments
    /// * `interval` - Time between pings
    /// * `is_connected` - Pings are only sent while this returns true
    /// * `send` - Enqueues a frame; returning false ends the heartbeat
    pub fn new<P, S>(interval: Duration, is_connected: P, send: S) -> Self
    where
        P: Fn() -> bool + Send + Sync + 'static,
        S: Fn(ClientFrame) -> bool + Send + Sync + 'static,
    {
        Self {
            interval,
            is_connected: Arc::new(is_connected),
            send: Arc::new(send),
            task: None,
        }
    }

    /// Start the interval timer, restarting it if already running
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) {
        self.stop();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let interval = self.interval;
        let is_connected = Arc::clone(&self.is_connected);
        let send = Arc::clone(&self.send);

        let handle = tokio::spawn(async move {
            heartbeat_task(interval, is_connected, send, shutdown_rx).await;
        });

        self.task = Some((handle, shutdown_tx));
    }

    /// Cancel the interval timer
    pub fn stop(&mut self) {
        if let Some((_handle, shutdown_tx)) = self.task.take() {
            // the task observes the signal (or the dropped sender) and exits
            let _ = shutdown_tx.send(());
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .map(|(handle, _)| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn heartbeat_task(
    interval: Duration,
    is_connected: ConnectedProbe,
    send: FrameSink,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    // If we miss ticks due to slow processing, skip them rather than bursting
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // Skip the first immediate tick - wait for the first interval
    ticker.tick().await;

    debug!("Heartbeat task started with interval: {:?}", interval);

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("Heartbeat task received shutdown signal");
                break;
            }
            _ = ticker.tick() => {
                if !is_connected() {
                    debug!("Heartbeat tick skipped, connection not open");
                    continue;
                }
                if !send(ClientFrame::Ping) {
                    debug!("Heartbeat sink closed, shutting down heartbeat task");
                    break;
                }
            }
        }
    }

    debug!("Heartbeat task exiting");
}
