//! Client configuration.
//!
//! Settings live in `~/.config/richpresence/config.toml` by default:
//!
//! ```toml
//! client_id = "123456789012345678"
//! connect_timeout = 5
//! ready_timeout = 10
//! keepalive_interval = 15
//! shutdown_grace_ms = 500
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::endpoint::ENDPOINT_COUNT;
use crate::error::{ClientError, ClientResult};

/// Configuration for the rich presence client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Application id sent in the handshake.
    pub client_id: Option<String>,

    /// Per-endpoint connect timeout in seconds.
    pub connect_timeout: u64,

    /// Seconds to wait for `READY` after the handshake.
    pub ready_timeout: u64,

    /// Seconds between keep-alive pings once ready (0 disables them).
    pub keepalive_interval: u64,

    /// Milliseconds to wait after clearing presence before closing.
    pub shutdown_grace_ms: u64,

    /// Number of endpoint indices to try.
    pub max_endpoints: u8,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            connect_timeout: 5,
            ready_timeout: 10,
            keepalive_interval: 15,
            shutdown_grace_ms: 500,
            max_endpoints: ENDPOINT_COUNT,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if absent.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            ClientError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("richpresence")
            .join("config.toml")
    }

    /// Builder: set the application id.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Builder: set the keep-alive period in seconds.
    pub fn with_keepalive_interval(mut self, secs: u64) -> Self {
        self.keepalive_interval = secs;
        self
    }

    /// Builder: set the READY timeout in seconds.
    pub fn with_ready_timeout(mut self, secs: u64) -> Self {
        self.ready_timeout = secs;
        self
    }

    /// Builder: set the shutdown grace period in milliseconds.
    pub fn with_shutdown_grace_ms(mut self, millis: u64) -> Self {
        self.shutdown_grace_ms = millis;
        self
    }

    /// Builder: set how many endpoint indices are tried.
    pub fn with_max_endpoints(mut self, count: u8) -> Self {
        self.max_endpoints = count;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Endpoint count clamped to the protocol's `1..=10` range.
    pub fn endpoint_count(&self) -> u8 {
        self.max_endpoints.clamp(1, ENDPOINT_COUNT)
    }
}
