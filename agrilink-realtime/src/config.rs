//! Channel configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::backoff::{reconnect_delay, saturating_millis};
use crate::error::ChannelError;

/// Reconnect policy. Defaults: 1s base doubling per attempt, capped at 30s,
/// five attempts, no jitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ReconnectConfig {
    pub base_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
    pub max_attempts: u32,
    pub jitter_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_ms: 1_000,
            max_ms: 30_000,
            multiplier: 2.0,
            max_attempts: 5,
            jitter_ms: 0,
        }
    }
}

impl ReconnectConfig {
    pub fn validate(&self) -> Result<(), ChannelError> {
        if self.base_ms == 0 {
            return Err(ChannelError::InvalidConfig {
                field: "reconnect.base_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.max_ms < self.base_ms {
            return Err(ChannelError::InvalidConfig {
                field: "reconnect.max_ms",
                reason: "must be >= base_ms".to_string(),
            });
        }
        if self.multiplier < 1.0 {
            return Err(ChannelError::InvalidConfig {
                field: "reconnect.multiplier",
                reason: "must be >= 1.0".to_string(),
            });
        }
        Ok(())
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        reconnect_delay(self, attempt)
    }
}

/// Default bound on one handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Base WebSocket URL of the push endpoint, without credentials.
    pub endpoint: String,
    /// A handshake still pending after this long counts as failed.
    pub handshake_timeout_ms: u64,
    pub reconnect: ReconnectConfig,
}

impl ChannelConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            reconnect: ReconnectConfig::default(),
        }
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout_ms = saturating_millis(timeout);
        self
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ChannelError> {
        if self.endpoint.trim().is_empty() {
            return Err(ChannelError::InvalidConfig {
                field: "ws_endpoint",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.endpoint.starts_with("ws://") && !self.endpoint.starts_with("wss://") {
            return Err(ChannelError::InvalidConfig {
                field: "ws_endpoint",
                reason: "must be a ws:// or wss:// URL".to_string(),
            });
        }
        if self.handshake_timeout_ms == 0 {
            return Err(ChannelError::InvalidConfig {
                field: "handshake_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        self.reconnect.validate()
    }
}
