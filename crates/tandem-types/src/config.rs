//! Node configuration.
//!
//! Every field has a default so a partial (or missing) `config.toml` still
//! yields a usable configuration. Durations are stored as milliseconds to keep
//! the TOML flat.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default protocol port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default peer address.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// Errors from configuration validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("port must be non-zero")]
    ZeroPort,
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
    #[error("address must not be empty")]
    EmptyAddress,
}

/// Configuration for a Tandem node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Peer address (host name or IP) probed and connected to as Client.
    pub address: String,
    /// Fixed protocol port, used both for listening and for reaching the peer.
    pub port: u16,
    /// Interface the listener binds while Server.
    pub listen_host: String,
    /// Connect timeout for probes, control sends and the client connection.
    pub probe_timeout_ms: u64,
    /// Heartbeat cadence (server idle heartbeat and client tick).
    pub heartbeat_interval_ms: u64,
    /// Client liveness poll cadence.
    pub liveness_interval_ms: u64,
    /// Delay between closing the listener and taking the Client role.
    pub swap_grace_ms: u64,
    /// Window during which connect/bind failures are retried after a swap.
    pub handoff_timeout_ms: u64,
    /// Consecutive bind failures tolerated before the node gives up.
    pub bind_retry_limit: u32,
    /// Base backoff between bind failures.
    pub bind_backoff_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            listen_host: "0.0.0.0".to_string(),
            probe_timeout_ms: 1000,
            heartbeat_interval_ms: 1000,
            liveness_interval_ms: 1000,
            swap_grace_ms: 250,
            handoff_timeout_ms: 3000,
            bind_retry_limit: 5,
            bind_backoff_ms: 500,
        }
    }
}

impl NodeConfig {
    /// Check the configuration for values the arbitrator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::EmptyAddress);
        }
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        let durations = [
            ("probe_timeout_ms", self.probe_timeout_ms),
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("liveness_interval_ms", self.liveness_interval_ms),
        ];
        for (field, value) in durations {
            if value == 0 {
                return Err(ConfigError::ZeroDuration { field });
            }
        }
        Ok(())
    }

    /// `host:port` of the peer.
    pub fn peer_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// `host:port` the listener binds.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.port)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms)
    }

    pub fn swap_grace(&self) -> Duration {
        Duration::from_millis(self.swap_grace_ms)
    }

    pub fn handoff_timeout(&self) -> Duration {
        Duration::from_millis(self.handoff_timeout_ms)
    }

    /// Backoff before the next bind attempt after `failures` consecutive
    /// failures. Doubles per failure, capped at 8x the base.
    pub fn bind_backoff(&self, failures: u32) -> Duration {
        let factor = 1u64 << failures.saturating_sub(1).min(3);
        Duration::from_millis(self.bind_backoff_ms.saturating_mul(factor))
    }
}
