//! Graceful shutdown for the long-running binaries

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::time::sleep;
use tracing::info;

const CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Shared running flag cleared on Ctrl+C
pub struct ShutdownManager {
    flag: Arc<AtomicBool>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Spawn a Ctrl+C handler that triggers shutdown
    pub fn spawn_signal_handler(&self) {
        let flag = Arc::clone(&self.flag);
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                info!("Received shutdown signal (Ctrl+C)");
                flag.store(false, Ordering::Release);
            }
        });
    }

    pub fn trigger(&self) {
        self.flag.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Sleep for `duration`, waking early once shutdown is triggered
    pub async fn interruptible_sleep(&self, duration: Duration) {
        let mut elapsed = Duration::ZERO;
        while elapsed < duration && self.is_running() {
            let step = CHECK_INTERVAL.min(duration - elapsed);
            sleep(step).await;
            elapsed += step;
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}
