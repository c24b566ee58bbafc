//! mediacache - Two-tier read-through cache
//!
//! Sits in front of expensive, rate-limited upstream lookups (metadata
//! search, media info, stream resolution):
//! - Local tier: bounded in-process Moka cache with TTL and LRU eviction
//! - Shared tier: optional Redis store shared across instances
//! - Loader: caller-supplied async fetch, run only when both tiers miss
//!
//! Every resolved value is labelled with the tier that produced it
//! (`MEMORY`, `SHARED` or `MISS`). Shared tier failures never fail a request;
//! they degrade to a miss and are logged and counted. Only loader errors
//! reach the caller, and they are never cached.

mod config;
mod error;
mod key;
mod local_tier;
mod orchestrator;
pub mod shared_tier;
mod stats;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use config::{CacheConfig, LocalTierConfig, SharedTierConfig};
pub use error::{CacheError, SharedTierError};
pub use key::{CacheKey, ParamBag, build_key};
pub use local_tier::LocalTier;
pub use orchestrator::{CACHE_TIER_HEADER, CacheOrchestrator, Cacheable, Resolved, TierLabel};
pub use shared_tier::{DisabledTier, RedisTier, SharedTier, TierResult, build_shared_tier};
pub use stats::CacheStatsSnapshot;

// Re-export async_trait for custom SharedTier implementations
pub use async_trait::async_trait;
