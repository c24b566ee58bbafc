//! In-memory shared tier for tests.
//!
//! Behaves like a single Redis instance that honours per-key TTLs, and can
//! be switched into an outage mode where every call fails.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;

use crate::SharedTierError;
use crate::shared_tier::{SharedTier, TierResult};

#[derive(Debug)]
struct StoredEntry {
    bytes: Vec<u8>,
    ttl_seconds: u64,
    expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct MockSharedTier {
    entries: Mutex<HashMap<String, StoredEntry>>,
    failing: AtomicBool,
    get_calls: AtomicUsize,
    set_calls: AtomicUsize,
}

impl MockSharedTier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tier that fails every operation until [`set_failing`](Self::set_failing) clears it.
    pub fn unreachable() -> Self {
        let tier = Self::default();
        tier.set_failing(true);
        tier
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Store `value` as JSON, as the orchestrator would.
    pub fn seed<T: Serialize>(&self, key: &str, value: &T) {
        let bytes = serde_json::to_vec(value).expect("seed value serializes");
        self.seed_raw(key, bytes);
    }

    pub fn seed_raw(&self, key: &str, bytes: Vec<u8>) {
        self.insert(key, bytes, 3600);
    }

    /// Raw bytes currently stored under `key`, ignoring outage mode.
    pub fn stored(&self, key: &str) -> Option<Vec<u8>> {
        self.live(key, |entry| entry.bytes.clone())
    }

    /// TTL passed with the last write of `key`.
    pub fn stored_ttl(&self, key: &str) -> Option<u64> {
        self.live(key, |entry| entry.ttl_seconds)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    fn insert(&self, key: &str, bytes: Vec<u8>, ttl_seconds: u64) {
        let entry = StoredEntry {
            bytes,
            ttl_seconds,
            expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
        };
        self.lock().insert(key.to_owned(), entry);
    }

    fn live<T>(&self, key: &str, f: impl FnOnce(&StoredEntry) -> T) -> Option<T> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(f(entry)),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        None
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn outage(&self) -> Option<SharedTierError> {
        self.failing
            .load(Ordering::SeqCst)
            .then(|| SharedTierError::Other("connection refused".to_owned()))
    }
}

#[async_trait]
impl SharedTier for MockSharedTier {
    async fn get(&self, key: &str) -> TierResult<Vec<u8>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.outage() {
            return TierResult::Unavailable(e);
        }
        match self.stored(key) {
            Some(bytes) => TierResult::Hit(bytes),
            None => TierResult::Miss,
        }
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl_seconds: u64,
    ) -> Result<(), SharedTierError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.outage() {
            return Err(e);
        }
        self.insert(key, value, ttl_seconds);
        Ok(())
    }
}
