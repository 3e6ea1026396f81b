//! Freshness metadata carried by every cache read.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Result of a cache read.
///
/// Callers always learn whether the value came from the cache and how old
/// it is, so a dashboard can show "updated 3 minutes ago" without tracking
/// fetch times itself.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRead<T> {
    value: T,
    /// When the value was fetched from the backend.
    cached_at: DateTime<Utc>,
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    /// A value served from a live entry.
    pub fn from_cache(value: T, cached_at: DateTime<Utc>) -> Self {
        Self {
            value,
            cached_at,
            was_cache_hit: true,
        }
    }

    /// A value that came from a fetch, either started by this read or
    /// shared with a concurrent one.
    pub fn from_fetch(value: T, cached_at: DateTime<Utc>) -> Self {
        Self {
            value,
            cached_at,
            was_cache_hit: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }

    /// Time since the value was fetched.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.cached_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit
    }

    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            cached_at: self.cached_at,
            was_cache_hit: self.was_cache_hit,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_hit_and_miss_flags() {
        let now = Utc::now();
        assert!(CacheRead::from_cache(1, now).was_cache_hit());
        assert!(CacheRead::from_fetch(1, now).was_cache_miss());
    }

    #[test]
    fn test_age_of_old_value() {
        let read = CacheRead::from_cache("report", Utc::now() - ChronoDuration::seconds(90));
        assert!(read.age() >= Duration::from_secs(90));
    }

    #[test]
    fn test_future_timestamp_has_zero_age() {
        let read = CacheRead::from_fetch((), Utc::now() + ChronoDuration::seconds(60));
        assert_eq!(read.age(), Duration::ZERO);
    }

    #[test]
    fn test_map_keeps_metadata() {
        let cached_at = Utc::now();
        let read = CacheRead::from_cache(vec![1, 2, 3], cached_at).map(|v| v.len());
        assert_eq!(read.value(), &3);
        assert_eq!(read.cached_at(), cached_at);
        assert!(read.was_cache_hit());
    }
}
