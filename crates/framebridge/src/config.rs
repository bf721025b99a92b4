//! Bridge Configuration
//!
//! Loaded from a TOML file. Every section is optional.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use framebridge_engine::EngineConfig;
use framebridge_types::ReadOptions;

/// Error type for config loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// Top-level bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub http: HttpConfig,
    /// Read defaults layered over the built-in ones
    #[serde(default)]
    pub read: ReadOptions,
}

/// Worker thread and engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_name")]
    pub name: String,
    /// Engine thread count for reads that do not set `numThreads`
    #[serde(default)]
    pub num_threads: Option<usize>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: default_worker_name(),
            num_threads: None,
        }
    }
}

fn default_worker_name() -> String {
    "framebridge-worker".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Unset means calls wait for as long as the worker takes.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

/// HTTP client settings for URL sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_http_timeout(),
        }
    }
}

fn default_user_agent() -> String {
    concat!("framebridge/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_http_timeout() -> u64 {
    60
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded bridge config from: {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Built-in read defaults with the `[read]` section applied on top.
    pub fn read_defaults(&self) -> ReadOptions {
        ReadOptions::defaults().merge(&self.read)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            num_threads: self.worker.num_threads,
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.dispatcher.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }
}
