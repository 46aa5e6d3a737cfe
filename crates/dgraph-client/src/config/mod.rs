//! Client configuration.
//!
//! Loaded from TOML files or built in code.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::ConnectionConfig;
use crate::error::{ClientError, ClientResult};

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server URIs, all members of one cluster.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Per-call deadline in whole seconds.
    #[serde(default)]
    pub deadline_secs: Option<u64>,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// TCP keepalive interval in seconds.
    #[serde(default)]
    pub tcp_keepalive_secs: Option<u64>,
}

fn default_endpoints() -> Vec<String> {
    vec!["http://localhost:9080".to_string()]
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            deadline_secs: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            tcp_keepalive_secs: None,
        }
    }
}

impl ClientConfig {
    /// Creates a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the endpoint list.
    pub fn endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    /// Appends an endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }

    /// Sets the per-call deadline.
    pub fn deadline_secs(mut self, secs: u64) -> Self {
        self.deadline_secs = Some(secs);
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(content: &str) -> ClientResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ClientResult<()> {
        if self.endpoints.is_empty() {
            return Err(ClientError::EmptyPool);
        }
        if let Some(blank) = self.endpoints.iter().find(|e| e.trim().is_empty()) {
            return Err(ClientError::InvalidConfig(format!(
                "blank endpoint {blank:?}"
            )));
        }
        if self.deadline_secs == Some(0) {
            return Err(ClientError::InvalidConfig(
                "deadline_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the per-call deadline.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    /// Returns one connection configuration per endpoint.
    pub fn connection_configs(&self) -> Vec<ConnectionConfig> {
        self.endpoints
            .iter()
            .map(|endpoint| {
                ConnectionConfig::new(endpoint.clone())
                    .connect_timeout(Duration::from_millis(self.connect_timeout_ms))
                    .tcp_keepalive(self.tcp_keepalive_secs.map(Duration::from_secs))
            })
            .collect()
    }
}
