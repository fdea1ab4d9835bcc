//! Configuration loading and management for the illustrative `fleet-service`
//! binary. Loading hierarchy: environment > file > defaults, modeled on the
//! file+env overlay the workspace's config crate uses elsewhere.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

fn default_requests_per_minute() -> u32 {
    600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// When set, every request must carry this bearer token. `None` means
    /// the illustrative binary runs unauthenticated - production deployments
    /// are expected to front this with a real auth layer.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

/// Runtime configuration for `fleet-service`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
    #[serde(default = "default_shutdown_timeout_seconds")]
    pub shutdown_timeout_seconds: u64,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_worker_pool_size() -> usize {
    16
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("./audit-log")
}

fn default_shutdown_timeout_seconds() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: default_port(),
            log_level: default_log_level(),
            worker_pool_size: default_worker_pool_size(),
            logs_dir: default_logs_dir(),
            shutdown_timeout_seconds: default_shutdown_timeout_seconds(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Config {
    /// Loads a file (if `path` exists), then applies environment overrides,
    /// then validates. A missing file is not an error - defaults apply.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            Config::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `FLEET_*` environment variables take precedence over the file and
    /// the built-in defaults.
    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("FLEET_PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }
        if let Ok(level) = std::env::var("FLEET_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Ok(size) = std::env::var("FLEET_WORKER_POOL_SIZE") {
            if let Ok(size) = size.parse() {
                self.worker_pool_size = size;
            }
        }
        if let Ok(dir) = std::env::var("FLEET_LOGS_DIR") {
            self.logs_dir = PathBuf::from(dir);
        }
        if let Ok(token) = std::env::var("FLEET_BEARER_TOKEN") {
            self.auth.bearer_token = Some(token);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=10_000).contains(&self.worker_pool_size) {
            return Err(ConfigError::Invalid(
                "workerPoolSize must be in [1, 10000]".to_string(),
            ));
        }
        if !matches!(self.log_level.as_str(), "debug" | "info" | "warn" | "error") {
            return Err(ConfigError::Invalid(format!(
                "logLevel '{}' must be one of debug, info, warn, error",
                self.log_level
            )));
        }
        if !(1..=300).contains(&self.shutdown_timeout_seconds) {
            return Err(ConfigError::Invalid(
                "shutdownTimeoutSeconds must be in [1, 300]".to_string(),
            ));
        }
        if self.rate_limit.requests_per_minute == 0 {
            return Err(ConfigError::Invalid(
                "rateLimit.requestsPerMinute must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load(Path::new("/nonexistent/fleet.toml")).unwrap();
        assert_eq!(config.port, default_port());
    }

    #[test]
    fn rejects_zero_worker_pool_size() {
        let config = Config {
            worker_pool_size: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_worker_pool_size_above_10000() {
        let config = Config {
            worker_pool_size: 10_001,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let config = Config {
            log_level: "trace".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_shutdown_timeout_out_of_range() {
        let config = Config {
            shutdown_timeout_seconds: 301,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
