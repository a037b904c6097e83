//! Realtime client settings
//!
//! Loaded from YAML, then overridden from the environment:
//!
//! | variable | overrides |
//! |---|---|
//! | `CIVIC_API_URL` | `api_base_url` |
//! | `CIVIC_API_TOKEN` | bearer token (never read from YAML) |

use crate::analytics::AnalyticsLiveClient;
use crate::search::SearchLiveClient;
use livesockets::{
    derive_endpoint, states::HasUrl, ExponentialBackoff, RealtimeClientBuilder, StaticToken,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

pub const API_URL_ENV: &str = "CIVIC_API_URL";
pub const API_TOKEN_ENV: &str = "CIVIC_API_TOKEN";

/// Settings shared by the search and analytics clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeSettings {
    /// REST base URL; the socket URL is derived from it
    pub api_base_url: String,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Seconds between heartbeat pings; 0 disables the heartbeat
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_stats_timeout")]
    pub stats_timeout_secs: u64,
    #[serde(default)]
    pub reconnect: ReconnectSettings,
    #[serde(default)]
    pub endpoints: EndpointSettings,

    /// Bearer token from .env (not in YAML)
    #[serde(skip)]
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectSettings {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// `~` for unlimited
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: ExponentialBackoff::DEFAULT_BASE_DELAY.as_millis() as u64,
            max_delay_ms: ExponentialBackoff::DEFAULT_MAX_DELAY.as_millis() as u64,
            max_attempts: Some(ExponentialBackoff::DEFAULT_MAX_ATTEMPTS),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSettings {
    pub search: String,
    pub analytics: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            search: "/ws/search".to_string(),
            analytics: "/ws/analytics".to_string(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_stats_timeout() -> u64 {
    5
}

impl RealtimeSettings {
    /// Load configuration from a YAML file and the environment
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut settings: RealtimeSettings = serde_yaml::from_str(&yaml_content)?;

        settings.apply_env_overrides(|key| std::env::var(key).ok());
        settings.validate()?;

        Ok(settings)
    }

    /// Parse and validate YAML without consulting the environment
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let settings: RealtimeSettings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply `CIVIC_API_URL` / `CIVIC_API_TOKEN` as returned by `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            info!("Overriding API base URL from environment variable");
            self.api_base_url = url;
        }
        if let Some(token) = lookup(API_TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.api_token = Some(token);
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for path in [&self.endpoints.search, &self.endpoints.analytics] {
            derive_endpoint(&self.api_base_url, path, None)
                .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        }

        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.stats_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "stats_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.reconnect.base_delay_ms == 0 {
            return Err(ConfigError::ValidationError(
                "reconnect.base_delay_ms must be greater than 0".to_string(),
            ));
        }

        if self.reconnect.max_delay_ms < self.reconnect.base_delay_ms {
            return Err(ConfigError::ValidationError(
                "reconnect.max_delay_ms must not be smaller than reconnect.base_delay_ms"
                    .to_string(),
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    pub fn reconnect_policy(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(self.reconnect.base_delay_ms),
            Duration::from_millis(self.reconnect.max_delay_ms),
            self.reconnect.max_attempts,
        )
    }

    /// A client builder for `path` carrying every setting
    pub fn client_builder(&self, path: &str) -> RealtimeClientBuilder<HasUrl> {
        let mut builder = livesockets::builder()
            .base_url(self.api_base_url.clone())
            .path(path)
            .reconnect_policy(self.reconnect_policy())
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .stats_timeout(Duration::from_secs(self.stats_timeout_secs));

        builder = match self.heartbeat_interval_secs {
            0 => builder.no_heartbeat(),
            secs => builder.heartbeat(Duration::from_secs(secs)),
        };

        if let Some(token) = &self.api_token {
            builder = builder.token_provider(StaticToken::new(token.clone()));
        }

        builder
    }

    pub fn build_search_client(&self) -> livesockets::Result<SearchLiveClient> {
        let client = self.client_builder(&self.endpoints.search).build()?;
        Ok(SearchLiveClient::new(client))
    }

    pub fn build_analytics_client(&self) -> livesockets::Result<AnalyticsLiveClient> {
        let client = self.client_builder(&self.endpoints.analytics).build()?;
        Ok(AnalyticsLiveClient::new(client))
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  API base URL: {}", self.api_base_url);
        info!("  Search endpoint: {}", self.endpoints.search);
        info!("  Analytics endpoint: {}", self.endpoints.analytics);
        info!("  Heartbeat: {}s", self.heartbeat_interval_secs);
        info!(
            "  Reconnect: {}ms base, {}ms cap, {:?} attempts",
            self.reconnect.base_delay_ms, self.reconnect.max_delay_ms, self.reconnect.max_attempts
        );
        info!("  Token: {}", if self.api_token.is_some() { "set" } else { "none" });
        info!("  Log level: {}", self.log_level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livesockets::ReconnectionPolicy;

    const MINIMAL: &str = "api_base_url: https://api.civic.example.org\n";

    #[test]
    fn test_defaults_fill_missing_fields() {
        let settings = RealtimeSettings::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.heartbeat_interval_secs, 30);
        assert_eq!(settings.stats_timeout_secs, 5);
        assert_eq!(settings.endpoints.search, "/ws/search");
        assert_eq!(settings.reconnect.max_attempts, Some(5));
        assert!(settings.api_token.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = RealtimeSettings::from_yaml_str(MINIMAL).unwrap();
        settings.apply_env_overrides(|key| match key {
            API_URL_ENV => Some("http://localhost:8000".to_string()),
            API_TOKEN_ENV => Some("t0ken".to_string()),
            _ => None,
        });
        assert_eq!(settings.api_base_url, "http://localhost:8000");
        assert_eq!(settings.api_token.as_deref(), Some("t0ken"));
    }

    #[test]
    fn test_empty_env_values_ignored() {
        let mut settings = RealtimeSettings::from_yaml_str(MINIMAL).unwrap();
        settings.apply_env_overrides(|_| Some(String::new()));
        assert_eq!(settings.api_base_url, "https://api.civic.example.org");
        assert!(settings.api_token.is_none());
    }

    #[test]
    fn test_validation_errors() {
        let bad = [
            "api_base_url: ftp://nope\n",
            "api_base_url: https://x\nlog_level: loud\n",
            "api_base_url: https://x\nstats_timeout_secs: 0\n",
            "api_base_url: https://x\nreconnect: {base_delay_ms: 500, max_delay_ms: 100, max_attempts: 3}\n",
        ];
        for yaml in bad {
            assert!(
                matches!(RealtimeSettings::from_yaml_str(yaml), Err(ConfigError::ValidationError(_))),
                "expected validation error for {:?}",
                yaml
            );
        }
    }

    #[test]
    fn test_unlimited_attempts() {
        let yaml = "api_base_url: https://x\nreconnect: {base_delay_ms: 100, max_delay_ms: 1000, max_attempts: ~}\n";
        let settings = RealtimeSettings::from_yaml_str(yaml).unwrap();
        let policy = settings.reconnect_policy();
        assert_eq!(policy.max_attempts(), None);
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn test_client_builder_carries_settings() {
        let mut settings = RealtimeSettings::from_yaml_str(
            "api_base_url: https://api.civic.example.org\nheartbeat_interval_secs: 0\n",
        )
        .unwrap();
        settings.api_token = Some("abc".to_string());

        let client = settings.client_builder("/ws/search").build().unwrap();
        let config = client.config();
        assert_eq!(config.heartbeat_interval(), None);
        assert!(config.has_token_provider());
        assert_eq!(
            config.endpoint(Some("abc")).unwrap().as_str(),
            "wss://api.civic.example.org/ws/search?token=abc"
        );
    }

    #[test]
    fn test_specialized_clients_use_their_endpoints() {
        let settings = RealtimeSettings::from_yaml_str(
            "api_base_url: http://localhost:8000\nendpoints: {search: /live/search, analytics: /live/stats}\n",
        )
        .unwrap();

        let search = settings.build_search_client().unwrap();
        let analytics = settings.build_analytics_client().unwrap();
        assert_eq!(search.client().config().path(), "/live/search");
        assert_eq!(analytics.client().config().path(), "/live/stats");
        assert_eq!(
            analytics.client().config().endpoint(None).unwrap().as_str(),
            "ws://localhost:8000/live/stats"
        );
    }
}
