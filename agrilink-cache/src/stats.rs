//! Cache counters.

/// Snapshot of cache usage since construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from a live entry.
    pub hits: u64,
    /// Reads that had to wait for a fetch (started or joined).
    pub misses: u64,
    /// Fetches actually started.
    pub fetches: u64,
    /// Fetches that returned an error.
    pub fetch_failures: u64,
    /// Fetch results dropped because their key was invalidated meanwhile.
    pub discarded: u64,
    /// Entries removed to stay within `max_entries`.
    pub evictions: u64,
    /// Entries currently stored, live or expired.
    pub entry_count: u64,
}

impl CacheStats {
    /// Fraction of reads served from cache (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
