//! Cache configuration

use std::time::Duration;

use serde::Deserialize;

use crate::CacheError;

const ENV_LOCAL_MAX_ENTRIES: &str = "MEDIACACHE_LOCAL_MAX_ENTRIES";
const ENV_LOCAL_TTL_SECONDS: &str = "MEDIACACHE_LOCAL_TTL_SECONDS";
const ENV_SHARED_TTL_SECONDS: &str = "MEDIACACHE_SHARED_TTL_SECONDS";
const ENV_SHARED_ENDPOINT: &str = "MEDIACACHE_SHARED_ENDPOINT";
const ENV_SHARED_KEY_PREFIX: &str = "MEDIACACHE_SHARED_KEY_PREFIX";
const ENV_SHARED_TIMEOUT_MS: &str = "MEDIACACHE_SHARED_TIMEOUT_MS";
const ENV_REDIS_URL: &str = "REDIS_URL";

/// Configuration for both cache tiers
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    pub local_tier: LocalTierConfig,
    pub shared_tier: SharedTierConfig,
}

/// Configuration for the in-process tier
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocalTierConfig {
    /// Maximum number of entries held before LRU eviction
    pub max_entries: u64,
    /// Time-to-live for local entries
    pub ttl_seconds: u64,
}

impl Default for LocalTierConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            ttl_seconds: 300, // 5 minutes
        }
    }
}

impl LocalTierConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.max_entries == 0 {
            return Err(CacheError::Configuration(
                "localTier.maxEntries must be positive".to_owned(),
            ));
        }
        if self.ttl_seconds == 0 {
            return Err(CacheError::Configuration(
                "localTier.ttlSeconds must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the networked tier.
///
/// Leaving `endpoint` unset disables the tier entirely.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SharedTierConfig {
    /// Time-to-live passed to the store on every write
    pub ttl_seconds: u64,
    /// Connection descriptor, e.g. `redis://127.0.0.1:6379/0`
    pub endpoint: Option<String>,
    /// Namespace prepended to every stored key
    pub key_prefix: String,
    /// Upper bound on a single round-trip, connection included
    pub timeout_ms: u64,
}

impl Default for SharedTierConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 900, // 15 minutes
            endpoint: None,
            key_prefix: "cache:".to_owned(),
            timeout_ms: 500,
        }
    }
}

impl SharedTierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.as_deref().is_some_and(|e| !e.trim().is_empty())
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.ttl_seconds == 0 {
            return Err(CacheError::Configuration(
                "sharedTier.ttlSeconds must be positive".to_owned(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(CacheError::Configuration(
                "sharedTier.timeoutMs must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

impl CacheConfig {
    /// Reject configurations that cannot produce a working cache.
    pub fn validate(&self) -> Result<(), CacheError> {
        self.local_tier.validate()?;
        self.shared_tier.validate()
    }

    /// Build a configuration from `MEDIACACHE_*` environment variables.
    ///
    /// Unset variables keep their defaults. The shared endpoint falls back to
    /// `REDIS_URL` when `MEDIACACHE_SHARED_ENDPOINT` is absent.
    pub fn from_env() -> Result<Self, CacheError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<L>(lookup: L) -> Result<Self, CacheError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_u64(&lookup, ENV_LOCAL_MAX_ENTRIES)? {
            config.local_tier.max_entries = v;
        }
        if let Some(v) = parse_u64(&lookup, ENV_LOCAL_TTL_SECONDS)? {
            config.local_tier.ttl_seconds = v;
        }
        if let Some(v) = parse_u64(&lookup, ENV_SHARED_TTL_SECONDS)? {
            config.shared_tier.ttl_seconds = v;
        }
        if let Some(v) = parse_u64(&lookup, ENV_SHARED_TIMEOUT_MS)? {
            config.shared_tier.timeout_ms = v;
        }
        if let Some(prefix) = lookup(ENV_SHARED_KEY_PREFIX) {
            config.shared_tier.key_prefix = prefix;
        }
        config.shared_tier.endpoint = lookup(ENV_SHARED_ENDPOINT)
            .or_else(|| lookup(ENV_REDIS_URL))
            .filter(|e| !e.trim().is_empty());

        config.validate()?;
        Ok(config)
    }
}

fn parse_u64<L>(lookup: &L, name: &str) -> Result<Option<u64>, CacheError>
where
    L: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<u64>().map(Some).map_err(|e| {
            CacheError::Configuration(format!("{} must be a non-negative integer: {}", name, e))
        }),
    }
}
