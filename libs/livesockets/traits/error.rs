use thiserror::Error;

/// Main error type for livesockets
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LiveSocketError {
    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed before the operation completed
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Operation requires an open connection
    #[error("Not connected")]
    NotConnected,

    /// Token supplier failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Malformed or unexpected frame
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Serialization of an outbound frame failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl From<serde_json::Error> for LiveSocketError {
    fn from(err: serde_json::Error) -> Self {
        LiveSocketError::Protocol(err.to_string())
    }
}

/// Result type for livesockets operations
pub type Result<T> = std::result::Result<T, LiveSocketError>;
