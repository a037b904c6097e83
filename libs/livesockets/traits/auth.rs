use crate::traits::error::Result;
use async_trait::async_trait;

/// Trait for supplying the bearer credential used at connect time
///
/// Token storage and refresh belong to the caller. The client only asks
/// for the current token right before each connection attempt, including
/// every reconnection, so a refreshed token is picked up automatically.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Get the credential for the next connection attempt
    ///
    /// # Returns
    /// * `Ok(Some(token))` - Append `token` as the `token` query parameter
    /// * `Ok(None)` - Connect anonymously
    /// * `Err(LiveSocketError)` - The attempt fails and counts towards backoff
    async fn bearer_token(&self) -> Result<Option<String>>;
}

/// A provider that never supplies a credential
pub struct NoToken;

#[async_trait]
impl TokenProvider for NoToken {
    async fn bearer_token(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// A provider that always returns the same credential
#[derive(Debug, Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn bearer_token(&self) -> Result<Option<String>> {
        if self.token.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.token.clone()))
    }
}
