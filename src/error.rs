//! Cache error types

use std::time::Duration;

use redis::RedisError;

/// Errors raised while building the cache.
///
/// These are startup conditions only. Per-request failures either come from
/// the caller's loader (returned verbatim) or from the shared tier (absorbed).
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Why a shared tier could not answer.
///
/// Always recovered inside the orchestrator and treated as a miss.
#[derive(Debug, thiserror::Error)]
pub enum SharedTierError {
    #[error("Shared tier is not configured")]
    Disabled,

    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Shared tier operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Shared tier error: {0}")]
    Other(String),
}

impl SharedTierError {
    /// True when the tier is simply switched off rather than failing.
    pub fn is_disabled(&self) -> bool {
        matches!(self, SharedTierError::Disabled)
    }
}
