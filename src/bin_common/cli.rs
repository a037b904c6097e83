//! CLI utilities for binaries
//!
//! Resolves the settings file and splits command line arguments.

use std::path::PathBuf;

pub const CONFIG_PATH_ENV: &str = "REALTIME_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/realtime.yaml";

/// Where to read settings from
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// `REALTIME_CONFIG_PATH`, falling back to `config/realtime.yaml`
    Default,
    /// Explicit path, e.g. from `--config`
    Custom(String),
}

impl ConfigSource {
    pub fn default_path(&self) -> &str {
        match self {
            ConfigSource::Default => DEFAULT_CONFIG_PATH,
            ConfigSource::Custom(path) => path,
        }
    }

    pub fn env_var_name(&self) -> &str {
        CONFIG_PATH_ENV
    }
}

/// Load configuration path from environment or use default
///
/// A custom path always wins over the environment.
pub fn load_config_from_env(source: ConfigSource) -> PathBuf {
    resolve_config_path(source, |key| std::env::var(key).ok())
}

/// [`load_config_from_env`] with an injectable variable lookup
pub fn resolve_config_path<F>(source: ConfigSource, lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    match source {
        ConfigSource::Custom(path) => path.into(),
        ConfigSource::Default => lookup(source.env_var_name())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| source.default_path().to_string())
            .into(),
    }
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

/// Positional arguments plus an optional `--config <path>`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    pub config: Option<String>,
    pub positional: Vec<String>,
}

impl CliArgs {
    pub fn from_args(args: impl IntoIterator<Item = String>) -> Self {
        let mut parsed = CliArgs::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if arg == "--config" {
                parsed.config = args.next();
            } else if let Some(path) = arg.strip_prefix("--config=") {
                parsed.config = Some(path.to_string());
            } else {
                parsed.positional.push(arg);
            }
        }
        parsed
    }

    pub fn config_source(&self) -> ConfigSource {
        match &self.config {
            Some(path) => ConfigSource::Custom(path.clone()),
            None => ConfigSource::Default,
        }
    }
}
