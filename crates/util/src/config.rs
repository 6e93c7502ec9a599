//! JSON configuration for flux binaries.
//!
//! The file lives in the standard configuration directory (`~/.config/flux/config.json` on
//! most platforms) unless `FLUX_CONFIG_PATH` points elsewhere. A missing file yields the
//! defaults; a file that exists but cannot be read or parsed is an error.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use dirs_next::{config_dir, home_dir};
use flux_types::ChainConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Environment variable allowing callers to override the config file path.
pub const CONFIG_PATH_ENV: &str = "FLUX_CONFIG_PATH";

/// Default filename for the JSON payload.
pub const CONFIG_FILE_NAME: &str = "config.json";

const DEFAULT_TICK_MS: u64 = 25;

/// Error surfaced when the configuration file exists but is unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluxConfig {
    /// Tracing filter used when `RUST_LOG` is unset (for example `flux_engine=debug`).
    pub log_filter: Option<String>,
    /// Settings applied to every chain the binary builds.
    pub chain: ChainConfig,
    pub demo: DemoConfig,
}

/// Settings for the demo scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Delay before a timer-backed capacitor fires, in milliseconds.
    pub tick_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self { tick_ms: DEFAULT_TICK_MS }
    }
}

impl FluxConfig {
    /// Loads the configuration from [`default_config_path`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&default_config_path())
    }

    /// Loads the configuration from `path`, returning defaults when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file; using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Path of the configuration file, honouring [`CONFIG_PATH_ENV`].
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_home(path.trim());
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("flux")
        .join(CONFIG_FILE_NAME)
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        Some(rest) => home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest),
        None if path == "~" => home_dir().unwrap_or_else(|| PathBuf::from("~")),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = FluxConfig::load_from(&temp_dir.path().join("absent.json")).expect("defaults");

        assert_eq!(config, FluxConfig::default());
        assert_eq!(config.demo.tick_ms, DEFAULT_TICK_MS);
        assert_eq!(config.chain.label, flux_types::DEFAULT_CHAIN_LABEL);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{ "log_filter": "flux_engine=debug", "chain": { "label": "deploy" } }"#).unwrap();

        let config = FluxConfig::load_from(&path).expect("parse config");
        assert_eq!(config.log_filter.as_deref(), Some("flux_engine=debug"));
        assert_eq!(config.chain.label, "deploy");
        assert_eq!(config.demo, DemoConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "{ not json").unwrap();

        let error = FluxConfig::load_from(&path).expect_err("parse failure");
        assert!(matches!(error, ConfigError::Parse { .. }));
        assert!(error.to_string().contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn env_override_selects_the_config_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("custom.json");
        fs::write(&path, r#"{ "demo": { "tick_ms": 5 } }"#).unwrap();

        temp_env::with_var(CONFIG_PATH_ENV, Some(path.as_os_str()), || {
            assert_eq!(default_config_path(), path);
            let config = FluxConfig::load().expect("load via env");
            assert_eq!(config.demo.tick_ms, 5);
        });
    }

    #[test]
    fn blank_env_override_uses_the_config_dir() {
        temp_env::with_var(CONFIG_PATH_ENV, Some("  "), || {
            let path = default_config_path();
            assert!(path.ends_with(Path::new("flux").join(CONFIG_FILE_NAME)));
        });
    }

    #[test]
    fn home_prefix_is_expanded() {
        let expanded = expand_home("~/flux/config.json");
        assert!(expanded.ends_with("flux/config.json"));
        assert_eq!(expand_home("/etc/flux.json"), PathBuf::from("/etc/flux.json"));
    }
}
