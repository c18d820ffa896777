//! Expirable Values and Entries
//!
//! An [`ExpirableValue`] freezes its expiration instant when it is built and
//! can answer "am I expired?" on its own, which is what makes lazy expiry on
//! `get` possible. An [`ExpirableEntry`] pairs a key with a shared handle to
//! that value so the reaper's priority queue and the map point at the very
//! same object.
//!
//! ## Ordering
//!
//! Entries order by `expire_at` ascending, then by the sequence stamp handed
//! out at `put` time. The expiration instant never changes after
//! construction, so an entry can sit in a heap indefinitely without breaking
//! the heap property.

use crate::error::{CacheError, CacheResult};
use crate::time::{Clock, TimeUnit};
use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{self, AtomicBool};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Anything with a fixed expiration instant.
pub trait Expirable {
    /// The instant at which this becomes expired.
    fn expire_at(&self) -> Instant;

    /// Returns `true` if `now` is at or past the expiration instant.
    fn is_expired_at(&self, now: Instant) -> bool;
}

/// A value together with the instant it stops being visible.
pub struct ExpirableValue<V> {
    value: V,
    created_at: Instant,
    expire_at: Instant,
    /// Write-once memo of the expiry check
    expired: AtomicBool,
}

impl<V> ExpirableValue<V> {
    /// Wraps `value` so that it expires `ttl` units after `now`.
    ///
    /// A zero or negative TTL expires at `now`, i.e. on the very next check.
    pub fn new(value: V, ttl: i64, unit: TimeUnit, now: Instant) -> CacheResult<Self> {
        let ttl_duration = unit.to_duration(ttl)?;
        let expire_at = now
            .checked_add(ttl_duration)
            .ok_or(CacheError::TtlOverflow { ttl, unit })?;

        Ok(Self {
            value,
            created_at: now,
            expire_at,
            expired: AtomicBool::new(false),
        })
    }

    /// The wrapped value.
    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// The TTL this value was created with, after clamping.
    pub fn ttl(&self) -> Duration {
        self.expire_at - self.created_at
    }

    /// Checks expiry against `clock`.
    #[inline]
    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        self.is_expired_at(clock.now())
    }
}

impl<V> Expirable for ExpirableValue<V> {
    #[inline]
    fn expire_at(&self) -> Instant {
        self.expire_at
    }

    #[inline]
    fn is_expired_at(&self, now: Instant) -> bool {
        if self.expired.load(atomic::Ordering::Relaxed) {
            return true;
        }
        if now >= self.expire_at {
            self.expired.store(true, atomic::Ordering::Relaxed);
            return true;
        }
        false
    }
}

impl<V: fmt::Debug> fmt::Debug for ExpirableValue<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpirableValue")
            .field("value", &self.value)
            .field("ttl", &self.ttl())
            .field("expired", &self.expired.load(atomic::Ordering::Relaxed))
            .finish()
    }
}

/// A key paired with the expirable value it was `put` with.
pub struct ExpirableEntry<K, V> {
    key: K,
    value: Arc<ExpirableValue<V>>,
    seq: u64,
}

impl<K, V> ExpirableEntry<K, V> {
    pub fn new(key: K, value: Arc<ExpirableValue<V>>, seq: u64) -> Self {
        Self { key, value, seq }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    /// The shared value, identical to the one the map held at `put` time.
    pub fn expirable_value(&self) -> &Arc<ExpirableValue<V>> {
        &self.value
    }

    /// Position of the originating `put` in the cache's write order.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl<K, V> Expirable for ExpirableEntry<K, V> {
    #[inline]
    fn expire_at(&self) -> Instant {
        self.value.expire_at()
    }

    #[inline]
    fn is_expired_at(&self, now: Instant) -> bool {
        self.value.is_expired_at(now)
    }
}

impl<K, V> PartialEq for ExpirableEntry<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K, V> Eq for ExpirableEntry<K, V> {}

impl<K, V> PartialOrd for ExpirableEntry<K, V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K, V> Ord for ExpirableEntry<K, V> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.expire_at()
            .cmp(&other.expire_at())
            .then(self.seq.cmp(&other.seq))
    }
}

impl<K: fmt::Debug, V> fmt::Debug for ExpirableEntry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpirableEntry")
            .field("key", &self.key)
            .field("seq", &self.seq)
            .field("ttl", &self.value.ttl())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;
    use std::cmp::Reverse;
    use std::collections::BinaryHeap;

    fn entry(key: &str, ttl_ms: i64, seq: u64, now: Instant) -> ExpirableEntry<String, u32> {
        let value = ExpirableValue::new(0, ttl_ms, TimeUnit::Milliseconds, now).unwrap();
        ExpirableEntry::new(key.to_string(), Arc::new(value), seq)
    }

    #[test]
    fn test_expires_at_ttl_boundary() {
        let clock = ManualClock::new();
        let value = ExpirableValue::new("v", 100, TimeUnit::Milliseconds, clock.now()).unwrap();

        assert_eq!(value.value(), &"v");
        assert!(!value.is_expired(&clock));

        clock.advance(Duration::from_millis(99));
        assert!(!value.is_expired(&clock));

        clock.advance(Duration::from_millis(1));
        assert!(value.is_expired(&clock));
    }

    #[test]
    fn test_expiry_is_sticky() {
        let clock = ManualClock::new();
        let start = clock.now();
        let value = ExpirableValue::new(1u8, 10, TimeUnit::Milliseconds, start).unwrap();

        clock.advance(Duration::from_millis(10));
        assert!(value.is_expired(&clock));

        // Once observed, expiry holds even for an earlier instant
        assert!(value.is_expired_at(start));
    }

    #[test]
    fn test_non_positive_ttl_is_expired_on_next_check() {
        let clock = ManualClock::new();
        let zero = ExpirableValue::new((), 0, TimeUnit::Seconds, clock.now()).unwrap();
        let negative = ExpirableValue::new((), -3, TimeUnit::Seconds, clock.now()).unwrap();

        assert!(zero.is_expired(&clock));
        assert!(negative.is_expired(&clock));
        assert_eq!(negative.ttl(), Duration::ZERO);
    }

    #[test]
    fn test_units_produce_same_expiration() {
        let now = Instant::now();
        let secs = ExpirableValue::new((), 1, TimeUnit::Seconds, now).unwrap();
        let millis = ExpirableValue::new((), 1000, TimeUnit::Milliseconds, now).unwrap();

        assert_eq!(secs.expire_at(), millis.expire_at());
        assert_eq!(secs.created_at(), now);
    }

    #[test]
    fn test_overflowing_ttl_is_rejected() {
        let result = ExpirableValue::new((), i64::MAX, TimeUnit::Seconds, Instant::now());
        assert!(matches!(result, Err(CacheError::TtlOverflow { .. })));
    }

    #[test]
    fn test_entry_shares_value_and_delegates_expiry() {
        let clock = ManualClock::new();
        let value = Arc::new(ExpirableValue::new(7, 5, TimeUnit::Milliseconds, clock.now()).unwrap());
        let entry = ExpirableEntry::new("k", Arc::clone(&value), 0);

        assert!(Arc::ptr_eq(entry.expirable_value(), &value));
        assert_eq!(entry.key(), &"k");
        assert_eq!(entry.expire_at(), value.expire_at());

        clock.advance(Duration::from_millis(5));
        assert!(entry.is_expired_at(clock.now()));
    }

    #[test]
    fn test_entries_order_soonest_first() {
        let now = Instant::now();
        let mut heap = BinaryHeap::new();
        heap.push(Reverse(entry("late", 300, 0, now)));
        heap.push(Reverse(entry("early", 100, 1, now)));
        heap.push(Reverse(entry("middle", 200, 2, now)));

        let order: Vec<String> = std::iter::from_fn(|| heap.pop())
            .map(|Reverse(e)| e.key().clone())
            .collect();
        assert_eq!(order, vec!["early", "middle", "late"]);
    }

    #[test]
    fn test_equal_expiry_breaks_ties_by_seq() {
        let now = Instant::now();
        let first = entry("a", 100, 1, now);
        let second = entry("b", 100, 2, now);

        assert!(first < second);
        assert_ne!(first, second);
    }
}
