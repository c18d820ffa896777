//! Background Expiry Reaper
//!
//! This module implements the background task that reclaims expired entries
//! from an [`ExpiryStore`]. Reads already hide expired values on their own
//! ("lazy expiry"); the reaper is what eventually frees the memory of keys
//! that are never read again.
//!
//! ## Design
//!
//! The reaper runs as a Tokio task and:
//! 1. Waits `initial_delay` (default: 1s) before the first cycle
//! 2. Runs a cycle every `period` (default: 2s) after that
//! 3. Each cycle drains the expired head of the store's expiration queue
//! 4. Logs how many entries were reclaimed or found stale
//!
//! A cycle only touches queue entries that are already due, so its cost is
//! proportional to the number of expirations, not to the size of the map.
//!
//! ## Fault Isolation
//!
//! A panic inside a cycle (for example from a value's `Drop`) is caught and
//! logged. The next cycle runs on schedule.

use crate::error::{CacheError, CacheResult};
use crate::storage::{ExpiryStore, ReapOutcome};
use std::any::Any;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info};

/// Configuration for the expiry reaper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaperConfig {
    /// Delay before the first cycle (default: 1s)
    pub initial_delay: Duration,

    /// Interval between cycles (default: 2s)
    pub period: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            period: Duration::from_secs(2),
        }
    }
}

impl ReaperConfig {
    /// Builds a config with the given delay and period.
    pub fn new(initial_delay: Duration, period: Duration) -> Self {
        Self {
            initial_delay,
            period,
        }
    }

    /// Checks that the config can be scheduled.
    pub fn validate(&self) -> CacheResult<()> {
        if self.period.is_zero() {
            return Err(CacheError::InvalidConfig(
                "period must be greater than zero".to_string(),
            ));
        }
        let now = Instant::now();
        if now.checked_add(self.initial_delay).is_none() {
            return Err(CacheError::InvalidConfig(format!(
                "initial delay of {:?} is too far in the future",
                self.initial_delay
            )));
        }
        if now.checked_add(self.period).is_none() {
            return Err(CacheError::InvalidConfig(format!(
                "period of {:?} is too far in the future",
                self.period
            )));
        }
        Ok(())
    }
}

/// A handle to the running reaper.
///
/// When this handle is dropped, the reaper task will be stopped.
#[derive(Debug)]
pub struct Reaper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,

    task: JoinHandle<()>,
}

impl Reaper {
    /// Starts the reaper as a background task on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfig`] for a zero period or a delay
    /// that cannot be scheduled, and
    /// [`CacheError::NoRuntime`] when called outside a runtime.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use flashttl::storage::{ExpiryStore, Reaper, ReaperConfig};
    /// use std::sync::Arc;
    ///
    /// let store = Arc::new(ExpiryStore::<String, String>::new());
    /// let reaper = Reaper::start(store, ReaperConfig::default())?;
    ///
    /// // Reaper runs in the background...
    ///
    /// // Dropping the reaper will stop it
    /// drop(reaper);
    /// ```
    pub fn start<K, V>(store: Arc<ExpiryStore<K, V>>, config: ReaperConfig) -> CacheResult<Self>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = runtime.spawn(reaper_loop(store, config.clone(), shutdown_rx));

        info!(
            initial_delay_ms = config.initial_delay.as_millis(),
            period_ms = config.period.as_millis(),
            "Background expiry reaper started"
        );

        Ok(Self { shutdown_tx, task })
    }

    /// Stops the reaper.
    ///
    /// This is called automatically when the handle is dropped. Calling it
    /// more than once is harmless.
    pub fn stop(&self) {
        let already_stopped = *self.shutdown_tx.borrow();
        if !already_stopped {
            let _ = self.shutdown_tx.send(true);
            info!("Background expiry reaper stopped");
        }
    }

    /// Returns true while the reaper task is alive.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main reaper loop.
async fn reaper_loop<K, V>(
    store: Arc<ExpiryStore<K, V>>,
    config: ReaperConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    K: Hash + Eq + Clone,
{
    let mut ticker = time::interval_at(Instant::now() + config.initial_delay, config.period);

    loop {
        // Wait for the next tick or shutdown signal
        tokio::select! {
            _ = ticker.tick() => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry reaper received shutdown signal");
                    return;
                }
            }
        }

        run_cycle(&store);
    }
}

/// Runs one reclamation cycle, containing any panic it raises.
fn run_cycle<K, V>(store: &ExpiryStore<K, V>) -> Option<ReapOutcome>
where
    K: Hash + Eq + Clone,
{
    match panic::catch_unwind(AssertUnwindSafe(|| store.reap_expired())) {
        Ok(outcome) => {
            if outcome.popped() > 0 {
                debug!(
                    reaped = outcome.reaped,
                    stale = outcome.stale,
                    keys_remaining = store.len(),
                    "Expired keys cleaned up"
                );
            }
            Some(outcome)
        }
        Err(payload) => {
            error!(
                panic = panic_message(payload.as_ref()),
                "Expiry reaper cycle panicked, continuing on schedule"
            );
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{ManualClock, TimeUnit};

    fn fast() -> ReaperConfig {
        ReaperConfig::new(Duration::from_millis(10), Duration::from_millis(10))
    }

    #[test]
    fn test_default_schedule() {
        let config = ReaperConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.period, Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_period_is_rejected() {
        let config = ReaperConfig::new(Duration::ZERO, Duration::ZERO);
        assert!(matches!(config.validate(), Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_unschedulable_durations_are_rejected() {
        let delay = ReaperConfig::new(Duration::MAX, Duration::from_millis(10));
        assert!(matches!(delay.validate(), Err(CacheError::InvalidConfig(_))));

        let period = ReaperConfig::new(Duration::from_millis(10), Duration::MAX);
        assert!(matches!(period.validate(), Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_start_requires_runtime() {
        let store = Arc::new(ExpiryStore::<String, String>::new());
        let result = Reaper::start(store, fast());
        assert_eq!(result.unwrap_err(), CacheError::NoRuntime);
    }

    #[tokio::test]
    async fn test_reaper_cleans_expired_keys() {
        let store = Arc::new(ExpiryStore::<String, String>::new());

        for i in 0..10 {
            store
                .put(format!("key{}", i), "value".to_string(), 50, TimeUnit::Milliseconds)
                .unwrap();
        }
        store
            .put("long".to_string(), "value".to_string(), 1, TimeUnit::Hours)
            .unwrap();
        assert_eq!(store.len(), 11);

        let _reaper = Reaper::start(Arc::clone(&store), fast()).unwrap();

        time::sleep(Duration::from_millis(200)).await;

        // Only the long-lived key should remain
        assert_eq!(store.len(), 1);
        assert_eq!(store.pending_expirations(), 1);
        assert_eq!(store.get("long"), Some("value".to_string()));
    }

    #[tokio::test]
    async fn test_reaper_keeps_overwritten_value() {
        let store = Arc::new(ExpiryStore::<String, String>::new());
        store
            .put("key".to_string(), "v1".to_string(), 30, TimeUnit::Milliseconds)
            .unwrap();
        store
            .put("key".to_string(), "v2".to_string(), 1, TimeUnit::Hours)
            .unwrap();

        let _reaper = Reaper::start(Arc::clone(&store), fast()).unwrap();
        time::sleep(Duration::from_millis(150)).await;

        assert_eq!(store.get("key"), Some("v2".to_string()));
        assert_eq!(store.stats().stale, 1);
        assert_eq!(store.pending_expirations(), 1);
    }

    #[tokio::test]
    async fn test_reaper_waits_for_initial_delay() {
        let store = Arc::new(ExpiryStore::<String, String>::new());
        store
            .put("key".to_string(), "v".to_string(), 0, TimeUnit::Milliseconds)
            .unwrap();

        let config = ReaperConfig::new(Duration::from_millis(300), Duration::from_millis(10));
        let _reaper = Reaper::start(Arc::clone(&store), config).unwrap();

        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.len(), 1, "no cycle may run before the initial delay");

        time::sleep(Duration::from_millis(400)).await;
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_reaper_stops_on_drop() {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(ExpiryStore::<String, String>::with_clock(clock.clone()));

        {
            let reaper = Reaper::start(Arc::clone(&store), fast()).unwrap();
            assert!(reaper.is_running());
            time::sleep(Duration::from_millis(30)).await;
            // Reaper is dropped here
        }

        store
            .put("key".to_string(), "value".to_string(), 10, TimeUnit::Milliseconds)
            .unwrap();
        clock.advance(Duration::from_millis(10));

        time::sleep(Duration::from_millis(100)).await;

        // Nothing reclaims it, but reads still hide it
        assert_eq!(store.len(), 1);
        assert!(store.get("key").is_none());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let store = Arc::new(ExpiryStore::<String, String>::new());
        let reaper = Reaper::start(store, fast()).unwrap();

        reaper.stop();
        reaper.stop();
        time::sleep(Duration::from_millis(50)).await;

        assert!(!reaper.is_running());
    }

    /// Panics when the last copy carrying `armed` is dropped.
    #[derive(Debug)]
    struct Landmine {
        armed: bool,
    }

    impl Clone for Landmine {
        fn clone(&self) -> Self {
            Landmine { armed: false }
        }
    }

    impl Drop for Landmine {
        fn drop(&mut self) {
            if self.armed && !std::thread::panicking() {
                panic!("landmine dropped");
            }
        }
    }

    #[test]
    fn test_cycle_panic_is_contained() {
        let store = ExpiryStore::<String, Landmine>::new();
        store
            .put("mine".to_string(), Landmine { armed: true }, 0, TimeUnit::Milliseconds)
            .unwrap();

        assert_eq!(run_cycle(&store), None);

        // The store is still usable afterwards
        store
            .put("safe".to_string(), Landmine { armed: false }, 0, TimeUnit::Milliseconds)
            .unwrap();
        assert_eq!(run_cycle(&store), Some(ReapOutcome { reaped: 1, stale: 0 }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_reaper_survives_panicking_cycle() {
        let store = Arc::new(ExpiryStore::<String, Landmine>::new());
        store
            .put("mine".to_string(), Landmine { armed: true }, 0, TimeUnit::Milliseconds)
            .unwrap();

        let reaper = Reaper::start(Arc::clone(&store), fast()).unwrap();
        time::sleep(Duration::from_millis(50)).await;

        store
            .put("later".to_string(), Landmine { armed: false }, 20, TimeUnit::Milliseconds)
            .unwrap();
        time::sleep(Duration::from_millis(100)).await;

        assert!(reaper.is_running());
        assert!(store.is_empty());
    }
}
