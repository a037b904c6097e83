use std::time::Duration;

/// Trait for defining reconnection policies
///
/// The connection manager asks [`should_reconnect`](Self::should_reconnect)
/// before scheduling attempt `n`, and only then asks for its delay. Attempts
/// are numbered from 1 and the count is reset by the manager, never by the
/// policy, so implementations stay pure.
pub trait ReconnectionPolicy: Send + Sync {
    /// Delay before reconnection attempt `attempt` (1-indexed)
    fn delay_for_attempt(&self, attempt: u32) -> Duration;

    /// Maximum number of consecutive attempts (`None` = unlimited)
    fn max_attempts(&self) -> Option<u32>;

    /// Check if attempt `attempt` may be scheduled
    fn should_reconnect(&self, attempt: u32) -> bool {
        self.max_attempts().map_or(true, |max| attempt <= max)
    }
}

/// Exponential backoff reconnection policy
///
/// Delays grow as `base_delay * 2^(attempt - 1)`, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
}

impl ExponentialBackoff {
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Create a new exponential backoff policy
    ///
    /// # Arguments
    /// * `base_delay` - Delay before the first reconnection attempt
    /// * `max_delay` - Upper bound for any single delay
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts,
        }
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_BASE_DELAY,
            Self::DEFAULT_MAX_DELAY,
            Some(Self::DEFAULT_MAX_ATTEMPTS),
        )
    }
}

impl ReconnectionPolicy for ExponentialBackoff {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }
}
