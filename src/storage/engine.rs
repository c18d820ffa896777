//! Thread-Safe Expiry Store
//!
//! This module implements the storage behind [`ExpiryCache`](crate::ExpiryCache):
//! a sharded concurrent map for O(1) lookups, and a min-heap of
//! [`ExpirableEntry`] values that the reaper drains in expiration order.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: The map is split into independently locked shards to reduce contention.
//! 2. **Lazy Expiry**: `get` checks the value's own expiry and never mutates the map.
//! 3. **Ordered Reclamation**: The reaper pops only expired heap heads, so it never scans the map.
//! 4. **Compare-and-Remove**: A popped entry removes its key only if the map still holds the
//!    exact `Arc` the entry carries. Stale entries left behind by overwrites are no-ops.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ExpiryStore                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │  put/get  │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! │  ┌───────────────────────────────────────────────┐         │
//! │  │ Mutex<BinaryHeap<Reverse<ExpirableEntry>>>    │  put/   │
//! │  │ (soonest expiry at the head)                  │  reaper │
//! │  └───────────────────────────────────────────────┘         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! No operation holds a shard lock and the queue lock at the same time.

use crate::error::CacheResult;
use crate::storage::expirable::{Expirable, ExpirableEntry, ExpirableValue};
use crate::time::{Clock, SystemClock, TimeUnit};
use std::borrow::Borrow;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tracing::trace;

/// Number of shards for the key map.
const NUM_SHARDS: usize = 64;

type ExpiryQueue<K, V> = BinaryHeap<Reverse<ExpirableEntry<K, V>>>;

/// A single shard holding the current value for a portion of the keys.
struct Shard<K, V> {
    map: RwLock<HashMap<K, Arc<ExpirableValue<V>>>>,
}

impl<K, V> Shard<K, V> {
    fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }

    // A panic elsewhere must not wedge put/get, so poisoning is ignored.
    // Every critical section leaves the map consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, Arc<ExpirableValue<V>>>> {
        self.map.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, Arc<ExpirableValue<V>>>> {
        self.map.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Result of one reclamation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapOutcome {
    /// Expired entries removed from the map
    pub reaped: u64,
    /// Expired queue entries whose key had since been overwritten or removed
    pub stale: u64,
}

impl ReapOutcome {
    /// Total number of queue entries popped.
    pub fn popped(&self) -> u64 {
        self.reaped + self.stale
    }
}

/// Point-in-time counters for the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Keys currently mapped, including expired ones not yet reaped
    pub entries: u64,
    /// Entries waiting in the expiration queue
    pub pending: u64,
    /// Total `put` calls
    pub puts: u64,
    /// Total `get` calls
    pub gets: u64,
    /// `get` calls that returned a value
    pub hits: u64,
    /// `get` calls that found nothing or an expired value
    pub misses: u64,
    /// Entries removed by the reaper
    pub reaped: u64,
    /// Stale queue entries the reaper discarded
    pub stale: u64,
}

/// The storage behind the expiry cache.
///
/// All operations take `&self`; wrap it in an `Arc` to share it between
/// callers and the reaper task.
///
/// # Example
///
/// ```
/// use flashttl::storage::ExpiryStore;
/// use flashttl::time::TimeUnit;
///
/// let store = ExpiryStore::new();
/// store.put("session".to_string(), 42u32, 30, TimeUnit::Seconds).unwrap();
///
/// assert_eq!(store.get("session"), Some(42));
/// assert_eq!(store.get("missing"), None);
/// ```
pub struct ExpiryStore<K, V> {
    shards: Box<[Shard<K, V>]>,

    /// Reclamation candidates, soonest expiry first
    queue: Mutex<ExpiryQueue<K, V>>,

    clock: Arc<dyn Clock>,

    /// Sequence stamp for the next `put`
    next_seq: AtomicU64,

    puts: AtomicU64,
    gets: AtomicU64,
    hits: AtomicU64,
    reaped: AtomicU64,
    stale: AtomicU64,
}

impl<K, V> std::fmt::Debug for ExpiryStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiryStore")
            .field("shards", &self.shards.len())
            .field("clock", &self.clock)
            .field("puts", &self.puts.load(Ordering::Relaxed))
            .field("reaped", &self.reaped.load(Ordering::Relaxed))
            .finish()
    }
}

impl<K: Hash + Eq + Clone, V> Default for ExpiryStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq + Clone, V> ExpiryStore<K, V> {
    /// Creates an empty store reading time from the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store reading time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::new()).collect();

        Self {
            shards,
            queue: Mutex::new(BinaryHeap::new()),
            clock,
            next_seq: AtomicU64::new(0),
            puts: AtomicU64::new(0),
            gets: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            reaped: AtomicU64::new(0),
            stale: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard<Q>(&self, key: &Q) -> &Shard<K, V>
    where
        Q: Hash + ?Sized,
    {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % NUM_SHARDS]
    }

    fn queue(&self) -> MutexGuard<'_, ExpiryQueue<K, V>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The clock this store measures expiry against.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Stores `value` under `key` for `ttl` units of `unit`.
    ///
    /// Any existing mapping for `key` is overwritten. Its queue entry stays
    /// behind and is discarded by the reaper when it comes due.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::TtlOverflow`](crate::CacheError::TtlOverflow) if
    /// the TTL does not fit on the clock. Nothing is stored in that case.
    pub fn put(&self, key: K, value: V, ttl: i64, unit: TimeUnit) -> CacheResult<()> {
        let expirable = Arc::new(ExpirableValue::new(value, ttl, unit, self.clock.now())?);
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        self.shard(&key)
            .write()
            .insert(key.clone(), Arc::clone(&expirable));

        self.queue()
            .push(Reverse(ExpirableEntry::new(key, expirable, seq)));

        self.puts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Returns the live value for `key`.
    ///
    /// Returns `None` if the key was never stored or its TTL has elapsed. This
    /// never removes anything; reclamation is left to the reaper.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.gets.fetch_add(1, Ordering::Relaxed);

        let expirable = self.shard(key).read().get(key).cloned()?;
        if expirable.is_expired(&*self.clock) {
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(expirable.value().clone())
    }

    /// Returns the instant at which the current value for `key` expires.
    ///
    /// Answers for expired-but-unreaped values too.
    pub fn expiration_of<Q>(&self, key: &Q) -> Option<Instant>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard(key).read().get(key).map(|v| v.expire_at())
    }

    /// Removes `key` only if it still maps to exactly `expected`.
    ///
    /// Returns `true` if the mapping was removed. A key that was overwritten
    /// or already removed is left untouched.
    pub fn remove_if_current(&self, key: &K, expected: &Arc<ExpirableValue<V>>) -> bool {
        let removed = {
            let mut map = self.shard(key).write();
            let is_current = map
                .get(key)
                .is_some_and(|current| Arc::ptr_eq(current, expected));
            if is_current {
                map.remove(key)
            } else {
                None
            }
        };
        // Dropped outside the shard lock
        removed.is_some()
    }

    /// Pops the queue head if it expired at or before `now`.
    fn pop_expired(&self, now: Instant) -> Option<ExpirableEntry<K, V>> {
        let mut queue = self.queue();
        let due = queue
            .peek()
            .is_some_and(|Reverse(head)| head.is_expired_at(now));
        if due {
            queue.pop().map(|Reverse(entry)| entry)
        } else {
            None
        }
    }

    /// Runs one reclamation pass.
    ///
    /// Pops expired entries in expiration order and compare-and-removes each
    /// from the map. Stops at the first head that has not expired, since
    /// nothing behind it can have expired either.
    pub fn reap_expired(&self) -> ReapOutcome {
        let now = self.clock.now();
        let mut outcome = ReapOutcome::default();

        while let Some(entry) = self.pop_expired(now) {
            if self.remove_if_current(entry.key(), entry.expirable_value()) {
                outcome.reaped += 1;
                self.reaped.fetch_add(1, Ordering::Relaxed);
            } else {
                trace!(seq = entry.seq(), "Skipped stale expiration entry");
                outcome.stale += 1;
                self.stale.fetch_add(1, Ordering::Relaxed);
            }
        }

        outcome
    }

    /// Number of mapped keys, including expired ones not yet reaped.
    pub fn len(&self) -> u64 {
        self.shards.iter().map(|s| s.read().len() as u64).sum()
    }

    /// Returns true if no keys are mapped.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.read().is_empty())
    }

    /// Number of entries waiting in the expiration queue.
    pub fn pending_expirations(&self) -> u64 {
        self.queue().len() as u64
    }

    /// Returns store statistics.
    pub fn stats(&self) -> CacheStats {
        let gets = self.gets.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);

        CacheStats {
            entries: self.len(),
            pending: self.pending_expirations(),
            puts: self.puts.load(Ordering::Relaxed),
            gets,
            hits,
            misses: gets.saturating_sub(hits),
            reaped: self.reaped.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
        }
    }
}
