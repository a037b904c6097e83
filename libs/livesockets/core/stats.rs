//! Request/response correlation for `get_stats`
//!
//! Each request gets a correlation token that travels as `request_id`. A
//! `stats` frame resolves the pending request carrying the same token, or the
//! oldest one still inside its deadline when the server omits the token.
//! A request leaves the table exactly once: by response, by timeout, or by
//! the connection going away.

use crate::core::protocol::ConnectionStats;
use crate::traits::{LiveSocketError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

struct PendingStatsRequest {
    token: String,
    responder: oneshot::Sender<Result<ConnectionStats>>,
    deadline: Instant,
}

#[derive(Default)]
pub struct StatsRequests {
    pending: Mutex<VecDeque<PendingStatsRequest>>,
    next_token: AtomicU64,
}

impl StatsRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new pending request expiring after `timeout`
    pub fn register(&self, timeout: Duration) -> (String, oneshot::Receiver<Result<ConnectionStats>>) {
        let seq = self.next_token.fetch_add(1, Ordering::Relaxed) + 1;
        let token = format!("stats_{}", seq);
        let (responder, rx) = oneshot::channel();
        self.pending.lock().push_back(PendingStatsRequest {
            token: token.clone(),
            responder,
            deadline: Instant::now() + timeout,
        });
        (token, rx)
    }

    /// Complete the request matching `request_id`, or the oldest live one
    ///
    /// Returns `false` when nothing was waiting.
    pub fn resolve(&self, request_id: Option<&str>, result: Result<ConnectionStats>) -> bool {
        let entry = {
            let mut pending = self.pending.lock();
            let position = match request_id {
                Some(id) => pending.iter().position(|req| req.token == id),
                None => {
                    let now = Instant::now();
                    pending.iter().position(|req| req.deadline > now)
                }
            };
            position.and_then(|index| pending.remove(index))
        };

        match entry {
            Some(request) => {
                debug!(request_id = %request.token, "Resolving stats request");
                // the caller may already have given up; nothing to do then
                let _ = request.responder.send(result);
                true
            }
            None => {
                debug!(request_id = ?request_id, "No pending stats request for response");
                false
            }
        }
    }

    /// Remove a request without completing it
    pub fn cancel(&self, token: &str) -> bool {
        let mut pending = self.pending.lock();
        match pending.iter().position(|req| req.token == token) {
            Some(index) => {
                pending.remove(index);
                true
            }
            None => false,
        }
    }

    /// Fail every pending request with `error`
    pub fn reject_all(&self, error: LiveSocketError) -> usize {
        let drained: Vec<PendingStatsRequest> = self.pending.lock().drain(..).collect();
        let count = drained.len();
        for request in drained {
            let _ = request.responder.send(Err(error.clone()));
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Race the response for `token` against `timeout`
    ///
    /// Dropping the returned future removes the pending entry.
    pub async fn wait(
        &self,
        token: &str,
        mut rx: oneshot::Receiver<Result<ConnectionStats>>,
        timeout: Duration,
    ) -> Result<ConnectionStats> {
        let _guard = PendingGuard {
            requests: self,
            token,
        };

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(LiveSocketError::ConnectionClosed(
                "stats request abandoned".to_string(),
            )),
            Err(_) => {
                if self.cancel(token) {
                    debug!(request_id = %token, "Stats request timed out");
                    return Err(LiveSocketError::Timeout(format!(
                        "no stats response within {:?}",
                        timeout
                    )));
                }
                // the response was taken from the table right at the deadline
                match rx.try_recv() {
                    Ok(result) => result,
                    Err(_) => Err(LiveSocketError::Timeout(format!(
                        "no stats response within {:?}",
                        timeout
                    ))),
                }
            }
        }
    }
}

/// Drops the table entry for `token` when its waiter goes away
struct PendingGuard<'a> {
    requests: &'a StatsRequests,
    token: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.requests.cancel(self.token) {
            debug!(request_id = %self.token, "Stats request abandoned by caller");
        }
    }
}
