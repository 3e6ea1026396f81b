//! Cache configuration.

use serde::Deserialize;
use std::time::Duration;

use crate::error::CacheError;

/// Default lifetime of a cached response.
pub const DEFAULT_TTL_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// How long a stored response stays live, in seconds.
    pub ttl_secs: u64,
    /// Upper bound on stored entries. The oldest entry is evicted first.
    pub max_entries: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
            max_entries: None,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.ttl_secs == 0 {
            return Err(CacheError::InvalidConfig {
                field: "ttl_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_entries == Some(0) {
            return Err(CacheError::InvalidConfig {
                field: "max_entries",
                reason: "must be greater than zero when set".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ttl_is_five_minutes() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl(), Duration::from_secs(300));
        assert!(config.max_entries.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_values() {
        let zero_ttl = CacheConfig {
            ttl_secs: 0,
            ..CacheConfig::default()
        };
        assert!(matches!(
            zero_ttl.validate(),
            Err(CacheError::InvalidConfig { field: "ttl_secs", .. })
        ));

        let zero_cap = CacheConfig::default().with_max_entries(0);
        assert!(matches!(
            zero_cap.validate(),
            Err(CacheError::InvalidConfig { field: "max_entries", .. })
        ));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"max_entries": 16}"#).expect("parse config");
        assert_eq!(config.ttl_secs, DEFAULT_TTL_SECS);
        assert_eq!(config.max_entries, Some(16));

        let unknown = serde_json::from_str::<CacheConfig>(r#"{"ttl": 5}"#);
        assert!(unknown.is_err());
    }
}
