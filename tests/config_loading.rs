//! Integration test: configuration loading
//!
//! Loads settings files from disk and the bin_common path helpers.

use civic_live::bin_common::{load_config_from_env, ConfigSource};
use civic_live::{ConfigError, RealtimeSettings};
use std::path::PathBuf;

fn write_temp(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("civic_live_{}_{}.yaml", name, std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_shipped_config_loads() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/realtime.yaml");
    let settings = RealtimeSettings::load(&path).unwrap();

    assert_eq!(settings.endpoints.search, "/ws/search");
    assert_eq!(settings.endpoints.analytics, "/ws/analytics");
    assert_eq!(settings.heartbeat_interval_secs, 30);
    assert_eq!(settings.reconnect.max_attempts, Some(5));
    assert!(settings.build_search_client().is_ok());
}

#[test]
fn test_load_from_file() {
    let path = write_temp(
        "custom",
        "api_base_url: https://api.civic.example.org\n\
         heartbeat_interval_secs: 0\n\
         reconnect:\n  base_delay_ms: 250\n  max_delay_ms: 2000\n  max_attempts: ~\n",
    );
    let settings = RealtimeSettings::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(settings.heartbeat_interval_secs, 0);
    assert_eq!(settings.reconnect.base_delay_ms, 250);
    assert_eq!(settings.reconnect.max_attempts, None);

    let search = settings.build_search_client().unwrap();
    assert_eq!(search.client().config().heartbeat_interval(), None);
}

#[test]
fn test_missing_file_is_file_error() {
    let result = RealtimeSettings::load("does/not/exist.yaml");
    assert!(matches!(result, Err(ConfigError::FileError(_))));
}

#[test]
fn test_malformed_yaml_is_yaml_error() {
    let path = write_temp("malformed", "api_base_url: [unterminated\n");
    let result = RealtimeSettings::load(&path);
    std::fs::remove_file(&path).ok();
    assert!(matches!(result, Err(ConfigError::YamlError(_))));
}

#[test]
fn test_custom_config_path() {
    let custom = ConfigSource::Custom("custom/path.yaml".to_string());
    let config_path = load_config_from_env(custom);
    assert_eq!(config_path.to_str().unwrap(), "custom/path.yaml");
}

#[test]
fn test_config_source_env_var_name() {
    assert_eq!(ConfigSource::Default.env_var_name(), "REALTIME_CONFIG_PATH");
    assert_eq!(ConfigSource::Default.default_path(), "config/realtime.yaml");
}
