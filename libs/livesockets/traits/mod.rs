//! # LiveSockets Traits
//!
//! The seams where callers plug behaviour into the client:
//!
//! - **TokenProvider**: supply a bearer credential for each connection attempt
//! - **ReconnectionPolicy**: decide how long to wait before the next attempt
//! - **EventHandler**: receive the events routed to one subscription
//!
//! ## Example
//!
//! ```rust,ignore
//! use livesockets::*;
//!
//! struct SessionToken(String);
//!
//! #[async_trait]
//! impl TokenProvider for SessionToken {
//!     async fn bearer_token(&self) -> Result<Option<String>> {
//!         Ok(Some(self.0.clone()))
//!     }
//! }
//! ```

pub mod auth;
pub mod error;
pub mod handler;
pub mod reconnect;

// Re-export commonly used types
pub use auth::{NoToken, StaticToken, TokenProvider};
pub use error::{LiveSocketError, Result};
pub use handler::EventHandler;
pub use reconnect::{ExponentialBackoff, ReconnectionPolicy};
