//! Networked tier shared across instances
//!
//! The tier speaks raw bytes; encoding values is the orchestrator's job.
//! Every failure is reported as data (`TierResult::Unavailable` or an `Err`
//! from `set`) and never escapes to the end caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::{CacheError, SharedTierConfig, SharedTierError};

/// Outcome of a tier lookup.
///
/// `Miss` means the store answered and the key was absent; `Unavailable`
/// means the store could not answer at all.
#[derive(Debug)]
pub enum TierResult<T> {
    Hit(T),
    Miss,
    Unavailable(SharedTierError),
}

impl<T> TierResult<T> {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, TierResult::Unavailable(_))
    }
}

/// Key/value store reachable over the network.
///
/// Implementations enforce their own timeouts.
#[async_trait]
pub trait SharedTier: Send + Sync + 'static {
    /// Read the raw bytes stored under `key`.
    async fn get(&self, key: &str) -> TierResult<Vec<u8>>;

    /// Store `value` under `key`, expiring after `ttl_seconds`.
    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl_seconds: u64,
    ) -> Result<(), SharedTierError>;

    /// False for the null tier; lets callers skip work that can never land.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Stand-in used when no endpoint is configured. Every read is
/// `Unavailable(Disabled)` and every write is a silent no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledTier;

#[async_trait]
impl SharedTier for DisabledTier {
    async fn get(&self, _key: &str) -> TierResult<Vec<u8>> {
        TierResult::Unavailable(SharedTierError::Disabled)
    }

    async fn set(
        &self,
        _key: &str,
        _value: Vec<u8>,
        _ttl_seconds: u64,
    ) -> Result<(), SharedTierError> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Redis-backed shared tier.
///
/// The connection manager is established on first use, so a store that is
/// down at startup only costs `Unavailable` lookups until it comes back.
pub struct RedisTier {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
    key_prefix: String,
    timeout: Duration,
}

impl RedisTier {
    /// Parse the endpoint without connecting.
    pub fn new(endpoint: &str, config: &SharedTierConfig) -> Result<Self, CacheError> {
        let client = redis::Client::open(endpoint).map_err(|e| {
            CacheError::Configuration(format!("sharedTier.endpoint is not a valid URL: {}", e))
        })?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
            key_prefix: config.key_prefix.clone(),
            timeout: config.timeout(),
        })
    }

    /// The key actually written to Redis for a cache key.
    pub fn format_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    async fn connection(&self) -> Result<ConnectionManager, SharedTierError> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                debug!("Connecting shared tier");
                ConnectionManager::new(self.client.clone()).await
            })
            .await?;
        Ok(conn.clone())
    }

    async fn with_timeout<T, F>(&self, op: F) -> Result<T, SharedTierError>
    where
        F: Future<Output = Result<T, SharedTierError>>,
    {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(SharedTierError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl SharedTier for RedisTier {
    async fn get(&self, key: &str) -> TierResult<Vec<u8>> {
        let redis_key = self.format_key(key);
        let result = self
            .with_timeout(async {
                let mut conn = self.connection().await?;
                let bytes: Option<Vec<u8>> = conn.get(&redis_key).await?;
                Ok(bytes)
            })
            .await;

        match result {
            Ok(Some(bytes)) => TierResult::Hit(bytes),
            Ok(None) => TierResult::Miss,
            Err(e) => TierResult::Unavailable(e),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl_seconds: u64,
    ) -> Result<(), SharedTierError> {
        let redis_key = self.format_key(key);
        self.with_timeout(async {
            let mut conn = self.connection().await?;
            conn.set_ex::<_, _, ()>(&redis_key, value, ttl_seconds).await?;
            Ok(())
        })
        .await
    }
}

/// Pick the shared tier implementation for `config`.
pub fn build_shared_tier(config: &SharedTierConfig) -> Result<Arc<dyn SharedTier>, CacheError> {
    config.validate()?;
    match config.endpoint.as_deref() {
        Some(endpoint) if config.is_enabled() => {
            Ok(Arc::new(RedisTier::new(endpoint.trim(), config)?))
        }
        _ => Ok(Arc::new(DisabledTier)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CacheKey, CacheOrchestrator, LocalTier, LocalTierConfig, TierLabel};
    use std::time::Instant;
    use tokio::net::TcpListener;

    fn config_with(endpoint: Option<&str>) -> SharedTierConfig {
        SharedTierConfig {
            endpoint: endpoint.map(str::to_owned),
            timeout_ms: 200,
            ..SharedTierConfig::default()
        }
    }

    #[tokio::test]
    async fn test_disabled_tier_is_quiet() {
        let tier = DisabledTier;
        assert!(!tier.is_enabled());

        match tier.get("media.search?q=dune").await {
            TierResult::Unavailable(e) => assert!(e.is_disabled()),
            other => panic!("expected Unavailable(Disabled), got {:?}", other),
        }
        assert!(tier.set("media.search?q=dune", b"{}".to_vec(), 60).await.is_ok());
    }

    #[test]
    fn test_build_without_endpoint_is_disabled() {
        let tier = build_shared_tier(&config_with(None)).expect("build");
        assert!(!tier.is_enabled());

        let tier = build_shared_tier(&config_with(Some(""))).expect("build");
        assert!(!tier.is_enabled());
    }

    #[test]
    fn test_build_with_endpoint_is_redis() {
        let tier = build_shared_tier(&config_with(Some("redis://127.0.0.1:6379"))).expect("build");
        assert!(tier.is_enabled());
    }

    #[test]
    fn test_malformed_endpoint_is_configuration_error() {
        let result = build_shared_tier(&config_with(Some("not a url")));
        assert!(matches!(result, Err(CacheError::Configuration(_))));
    }

    #[test]
    fn test_keys_are_namespaced() {
        let config = SharedTierConfig {
            key_prefix: "media:".to_owned(),
            ..config_with(None)
        };
        let tier = RedisTier::new("redis://127.0.0.1:6379", &config).expect("client");
        assert_eq!(tier.format_key("media.info?id=7"), "media:media.info?id=7");
    }

    #[tokio::test]
    async fn test_unreachable_store_reports_unavailable() {
        // Nothing listens on port 1.
        let tier = RedisTier::new("redis://127.0.0.1:1", &config_with(None)).expect("client");

        assert!(tier.get("media.info?id=7").await.is_unavailable());
        assert!(tier.set("media.info?id=7", b"{}".to_vec(), 60).await.is_err());
    }

    #[tokio::test]
    async fn test_silent_store_times_out_as_unavailable() {
        // Accepts connections and never answers a command.
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let endpoint = format!("redis://{}", addr);
        let tier = Arc::new(RedisTier::new(&endpoint, &config_with(None)).expect("client"));

        let started = Instant::now();
        match tier.get("media.info?id=7").await {
            TierResult::Unavailable(SharedTierError::Timeout(limit)) => {
                assert_eq!(limit, Duration::from_millis(200))
            }
            other => panic!("expected Unavailable(Timeout), got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(2));

        let local = LocalTier::new(&LocalTierConfig {
            max_entries: 8,
            ttl_seconds: 60,
        })
        .expect("valid config");
        let cache = CacheOrchestrator::<String>::new(local, tier, 60);

        let started = Instant::now();
        let resolved = cache
            .resolve(&CacheKey::from("media.info?id=7"), || async {
                Ok::<_, String>("loaded".to_owned())
            })
            .await
            .expect("timeout degrades to a miss");
        assert_eq!(resolved.tier, TierLabel::Miss);
        assert_eq!(resolved.value.as_str(), "loaded");
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(cache.stats().shared_unavailable, 1);
    }
}
