//! Bounded in-process tier
//!
//! Wraps a synchronous Moka cache with a plain LRU policy so capacity
//! pressure always removes the least recently used entry, never a freshly
//! inserted one. Moka applies recency updates and evictions in batches; the
//! tier flushes that work after every insert so the bound holds as soon as
//! `set` returns.

use std::sync::Arc;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;

use crate::{CacheError, CacheKey, LocalTierConfig};

/// In-memory cache with per-entry TTL and LRU eviction
pub struct LocalTier<V> {
    entries: Cache<CacheKey, Arc<V>>,
}

impl<V> Clone for LocalTier<V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<V> LocalTier<V>
where
    V: Send + Sync + 'static,
{
    /// Create a tier from validated configuration.
    pub fn new(config: &LocalTierConfig) -> Result<Self, CacheError> {
        config.validate()?;

        let entries = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl())
            .eviction_policy(EvictionPolicy::lru())
            .build();

        Ok(Self { entries })
    }

    /// Fetch a live entry. Expired entries read as absent and are dropped
    /// during the next maintenance pass. A hit refreshes recency.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<V>> {
        self.entries.get(key)
    }

    /// Insert or replace an entry, evicting the LRU entry when full.
    pub fn set(&self, key: CacheKey, value: Arc<V>) {
        self.entries.insert(key, value);
        self.entries.run_pending_tasks();
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries, including ones not yet reclaimed after expiry.
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
