//! Response cache for dashboard read endpoints.
//!
//! Responses are kept per key for a fixed TTL. Reads either return the live
//! entry or call the caller-supplied fetcher, and every read comes back as a
//! [`CacheRead<T>`] that says whether it was served from cache and when the
//! value was fetched.
//!
//! Concurrent misses on one key share a single fetch. Invalidating a key
//! while its fetch is in flight lets that fetch finish for its callers but
//! keeps its result out of the cache.
//!
//! ```ignore
//! let cache = ResponseCache::new(CacheConfig::default());
//! let read = cache
//!     .read(CacheKey::RiskAlerts, move || async move { api.risk_alerts().await }, false)
//!     .await?;
//! if read.was_cache_hit() {
//!     tracing::debug!(age_ms = u64::try_from(read.age().as_millis()).unwrap_or(u64::MAX), "served from cache");
//! }
//! ```

pub mod config;
pub mod error;
pub mod freshness;
pub mod response_cache;
pub mod stats;

pub use config::CacheConfig;
pub use error::{CacheError, FetchError};
pub use freshness::CacheRead;
pub use response_cache::{Invalidation, ResponseCache};
pub use stats::CacheStats;
