//! Expiry Cache
//!
//! [`ExpiryCache`] is the public face of FlashTTL. It owns an
//! [`ExpiryStore`] and the [`Reaper`] that reclaims its expired entries, and
//! stops the reaper when it is shut down or dropped.

use crate::error::CacheResult;
use crate::storage::{CacheStats, ExpiryStore, ReapOutcome, Reaper, ReaperConfig};
use crate::time::{Clock, SystemClock, TimeUnit};
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;

/// An in-memory key-value cache where every entry carries a TTL.
///
/// `get` hides expired entries immediately; a background reaper frees them
/// eventually. Must be created inside a Tokio runtime, which hosts the
/// reaper task.
///
/// # Thread Safety
///
/// All operations take `&self`. Wrap the cache in an `Arc` to share it.
///
/// # Example
///
/// ```
/// use flashttl::{ExpiryCache, TimeUnit};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), flashttl::CacheError> {
/// let cache = ExpiryCache::new()?;
///
/// cache.put("session".to_string(), "abc123".to_string(), 30, TimeUnit::Minutes)?;
/// assert_eq!(cache.get("session"), Some("abc123".to_string()));
/// assert_eq!(cache.get("unknown"), None);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ExpiryCache<K, V> {
    store: Arc<ExpiryStore<K, V>>,
    reaper: Reaper,
}

impl<K, V> ExpiryCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates a cache with the default reaper schedule (first cycle after
    /// 1s, then every 2s).
    pub fn new() -> CacheResult<Self> {
        Self::with_config(ReaperConfig::default())
    }

    /// Creates a cache with a custom reaper schedule.
    pub fn with_config(config: ReaperConfig) -> CacheResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a cache that measures expiry against `clock`.
    pub fn with_clock(config: ReaperConfig, clock: Arc<dyn Clock>) -> CacheResult<Self> {
        let store = Arc::new(ExpiryStore::with_clock(clock));
        let reaper = Reaper::start(Arc::clone(&store), config)?;

        Ok(Self { store, reaper })
    }

    /// Stores `value` under `key` for `ttl` units of `unit`.
    ///
    /// Overwrites any existing value for `key`. A zero or negative TTL stores
    /// a value that is already expired.
    pub fn put(&self, key: K, value: V, ttl: i64, unit: TimeUnit) -> CacheResult<()> {
        self.store.put(key, value, ttl, unit)
    }

    /// Returns the value for `key` unless it is absent or expired.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.store.get(key)
    }

    /// Runs a reclamation cycle now, on the calling thread.
    pub fn reap_now(&self) -> ReapOutcome {
        self.store.reap_expired()
    }

    /// Number of stored keys, including expired ones not yet reclaimed.
    pub fn len(&self) -> u64 {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Number of entries waiting for the reaper.
    pub fn pending_expirations(&self) -> u64 {
        self.store.pending_expirations()
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    /// Stops the background reaper.
    ///
    /// The cache keeps serving `put` and `get`; expired entries are simply no
    /// longer reclaimed unless [`ExpiryCache::reap_now`] is called.
    pub fn shutdown(&self) {
        self.reaper.stop();
    }

    pub fn is_reaper_running(&self) -> bool {
        self.reaper.is_running()
    }
}
