//! Civic Live - realtime search and analytics client
//!
//! ## Architecture
//!
//! - **livesockets**: connection manager, subscriptions and routing (re-exported from workspace)
//! - **search** / **analytics**: the two endpoint-specific clients
//! - **config**: YAML settings with environment overrides
//! - **bin_common**: shared utilities for the binaries (CLI, shutdown)
//!
//! ## Usage in Binaries
//!
//! ```ignore
//! use civic_live::bin_common::{load_config_from_env, ConfigSource};
//! use civic_live::RealtimeSettings;
//!
//! let settings = RealtimeSettings::load(load_config_from_env(ConfigSource::Default))?;
//! let search = settings.build_search_client()?;
//! ```

// Re-export workspace libraries for convenience
pub use livesockets;

pub mod analytics;
pub mod config;
pub mod logging;
pub mod search;

pub use analytics::{AnalyticsLiveClient, MetricsStream};
pub use config::{ConfigError, RealtimeSettings};
pub use logging::init_tracing;
pub use search::SearchLiveClient;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod shutdown;

    pub use cli::{load_config_from_env, parse_args, CliArgs, ConfigSource};
    pub use shutdown::ShutdownManager;
}
