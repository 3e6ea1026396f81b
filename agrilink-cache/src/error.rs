//! Cache errors.

use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Error returned by a fetcher, shared between every caller of one fetch.
pub type FetchError = Arc<dyn StdError + Send + Sync>;

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The fetcher failed. Nothing was stored.
    #[error("fetch for {key} failed: {source}")]
    Fetch {
        key: String,
        #[source]
        source: FetchError,
    },

    /// The entry under this key holds a different response type than the
    /// one requested.
    #[error("cached value for {key} has a different type")]
    TypeMismatch { key: String },

    #[error("invalid cache config {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

impl CacheError {
    /// The fetcher's own error, if it is an `E`.
    pub fn fetch_error<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            CacheError::Fetch { source, .. } => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error, PartialEq)]
    #[error("backend unavailable")]
    struct Unavailable;

    #[test]
    fn test_fetch_error_downcasts() {
        let err = CacheError::Fetch {
            key: "risk-alerts".to_string(),
            source: Arc::new(Unavailable),
        };
        assert_eq!(err.fetch_error::<Unavailable>(), Some(&Unavailable));
        assert!(err.fetch_error::<std::fmt::Error>().is_none());
        assert_eq!(
            err.to_string(),
            "fetch for risk-alerts failed: backend unavailable"
        );
    }
}
