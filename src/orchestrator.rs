//! Read-through protocol over the local and shared tiers
//!
//! Lookup order is local tier, shared tier, then the caller's loader:
//!
//! ```text
//! resolve ─► LocalTier ──hit──► (value, MEMORY)
//!               │ miss
//!               ▼
//!            SharedTier ─hit──► promote to LocalTier ─► (value, SHARED)
//!               │ miss / unavailable / undecodable
//!               ▼
//!            loader ──ok──► spawn SharedTier write, LocalTier write ─► (value, MISS)
//!               │ err
//!               ▼
//!            error returned as-is, nothing cached
//! ```
//!
//! Concurrent misses on the same key are not coalesced: each caller runs its
//! own loader and the last write wins in both tiers. Loaders are expected to
//! be idempotent reads.

use std::fmt::{self, Display};
use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, error, warn};

use crate::shared_tier::{SharedTier, TierResult, build_shared_tier};
use crate::stats::{CacheStats, CacheStatsSnapshot};
use crate::{CacheConfig, CacheError, CacheKey, LocalTier, ParamBag, SharedTierError, build_key};

/// Response header carrying [`TierLabel::as_header_value`].
pub const CACHE_TIER_HEADER: &str = "X-Cache-Tier";

/// Trait for types that can be cached
pub trait Cacheable: Serialize + DeserializeOwned + Send + Sync + 'static {}
impl<T> Cacheable for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Which tier produced a resolved value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierLabel {
    Memory,
    Shared,
    Miss,
}

impl TierLabel {
    #[inline]
    pub fn as_header_value(&self) -> &'static str {
        match self {
            TierLabel::Memory => "MEMORY",
            TierLabel::Shared => "SHARED",
            TierLabel::Miss => "MISS",
        }
    }

    #[inline]
    pub fn is_hit(&self) -> bool {
        !matches!(self, TierLabel::Miss)
    }
}

impl Display for TierLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_header_value())
    }
}

/// A value together with the tier that produced it
#[derive(Debug)]
pub struct Resolved<V> {
    pub value: Arc<V>,
    pub tier: TierLabel,
}

impl<V> Resolved<V> {
    pub fn into_parts(self) -> (Arc<V>, TierLabel) {
        (self.value, self.tier)
    }
}

struct Inner<V> {
    local: LocalTier<V>,
    shared: Arc<dyn SharedTier>,
    shared_ttl_seconds: u64,
    stats: CacheStats,
}

/// Two-tier read-through cache.
///
/// Cheap to clone; clones share both tiers and the counters.
pub struct CacheOrchestrator<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for CacheOrchestrator<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Cacheable> CacheOrchestrator<V> {
    /// Compose already-built tiers.
    pub fn new(local: LocalTier<V>, shared: Arc<dyn SharedTier>, shared_ttl_seconds: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                local,
                shared,
                shared_ttl_seconds,
                stats: CacheStats::default(),
            }),
        }
    }

    /// Validate `config` and build both tiers from it.
    ///
    /// Without a shared endpoint the orchestrator runs on the local tier
    /// alone. Does not touch the network.
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        config.validate()?;
        let local = LocalTier::new(&config.local_tier)?;
        let shared = build_shared_tier(&config.shared_tier)?;
        Ok(Self::new(local, shared, config.shared_tier.ttl_seconds))
    }

    /// Build the key for `route` and `params`, then [`resolve`](Self::resolve) it.
    pub async fn resolve_route<F, Fut, E>(
        &self,
        route: &str,
        params: &ParamBag,
        loader: F,
    ) -> Result<Resolved<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Display,
    {
        let key = build_key(route, params);
        self.resolve(&key, loader).await
    }

    /// Return the cached value for `key`, or run `loader` and cache its result.
    ///
    /// Only loader errors reach the caller; shared tier failures degrade to a
    /// miss. Failed loads are never cached.
    pub async fn resolve<F, Fut, E>(&self, key: &CacheKey, loader: F) -> Result<Resolved<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Display,
    {
        let inner = &self.inner;

        if let Some(value) = inner.local.get(key) {
            debug!(%key, tier = "memory", "Cache hit");
            inner.stats.record_memory_hit();
            return Ok(Resolved {
                value,
                tier: TierLabel::Memory,
            });
        }

        if let Some(value) = self.lookup_shared(key).await {
            debug!(%key, tier = "shared", "Cache hit");
            inner.stats.record_shared_hit();
            inner.local.set(key.clone(), Arc::clone(&value));
            return Ok(Resolved {
                value,
                tier: TierLabel::Shared,
            });
        }

        inner.stats.record_miss();
        let value = match loader().await {
            Ok(value) => Arc::new(value),
            Err(e) => {
                error!(%key, "Loader failed: {}", e);
                inner.stats.record_loader_failure();
                return Err(e);
            }
        };
        debug!(%key, "Loaded value on cache miss");

        self.populate_shared(key, &value);
        inner.local.set(key.clone(), Arc::clone(&value));

        Ok(Resolved {
            value,
            tier: TierLabel::Miss,
        })
    }

    /// Shared tier lookup; anything but a decodable hit reads as `None`.
    async fn lookup_shared(&self, key: &CacheKey) -> Option<Arc<V>> {
        let bytes = match self.inner.shared.get(key.as_str()).await {
            TierResult::Hit(bytes) => bytes,
            TierResult::Miss => {
                debug!(%key, tier = "shared", "Cache miss");
                return None;
            }
            TierResult::Unavailable(e) if e.is_disabled() => return None,
            TierResult::Unavailable(e) => {
                warn!(%key, "Shared tier GET failed ({}). Falling back to loader.", e);
                self.inner.stats.record_shared_unavailable();
                return None;
            }
        };

        match serde_json::from_slice::<V>(&bytes).map_err(SharedTierError::from) {
            Ok(value) => Some(Arc::new(value)),
            Err(e) => {
                warn!(%key, "Unreadable shared tier entry ({}). Treating as miss.", e);
                self.inner.stats.record_shared_unavailable();
                None
            }
        }
    }

    /// Write `value` to the shared tier in the background.
    ///
    /// Outside a Tokio runtime there is nothing to run the write on; it is
    /// dropped and counted as a write failure.
    fn populate_shared(&self, key: &CacheKey, value: &V) {
        if !self.inner.shared.is_enabled() {
            return;
        }

        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(%key, "Failed to serialize value for shared tier: {}", e);
                self.inner.stats.record_shared_write_failure();
                return;
            }
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(%key, "No Tokio runtime for shared tier SET. Skipping write.");
            self.inner.stats.record_shared_write_failure();
            return;
        };

        let inner = Arc::clone(&self.inner);
        let key = key.clone();
        runtime.spawn(async move {
            if let Err(e) = inner
                .shared
                .set(key.as_str(), bytes, inner.shared_ttl_seconds)
                .await
            {
                warn!(%key, "Shared tier SET failed: {}. Continuing.", e);
                inner.stats.record_shared_write_failure();
            }
        });
    }

    /// The in-process tier, for inspection.
    pub fn local(&self) -> &LocalTier<V> {
        &self.inner.local
    }

    pub fn shared_enabled(&self) -> bool {
        self.inner.shared.is_enabled()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.inner.stats.snapshot()
    }
}
