//! Storage Module
//!
//! This module provides the storage behind FlashTTL: a sharded concurrent
//! map of expirable values, an expiration-ordered queue, and the background
//! reaper that drains it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ExpiryStore                            │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! │  ┌───────────────────────────────────────────────┐         │
//! │  │  Expiration queue (min-heap by expire_at)     │         │
//! │  └───────────────────────────────────────────────┘         │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ reap_expired()
//!              ┌─────────────┴─────────────┐
//!              │          Reaper           │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Sharded Storage**: 64 independent shards reduce lock contention
//! - **Lazy Expiry**: Reads hide expired values without touching the map
//! - **Ordered Reclamation**: The reaper pops only due entries, never scans the map
//! - **Stale-Safe Removal**: Removal is conditional on value identity, so an
//!   overwritten key is never evicted by its old entry
//!
//! ## Example
//!
//! ```
//! use flashttl::storage::ExpiryStore;
//! use flashttl::time::TimeUnit;
//!
//! let store = ExpiryStore::new();
//! store.put("name".to_string(), "Ariz".to_string(), 60, TimeUnit::Seconds).unwrap();
//! assert_eq!(store.get("name"), Some("Ariz".to_string()));
//!
//! // Nothing is due yet
//! assert_eq!(store.reap_expired().popped(), 0);
//! ```

pub mod engine;
pub mod expirable;
pub mod reaper;

// Re-export commonly used types
pub use engine::{CacheStats, ExpiryStore, ReapOutcome};
pub use expirable::{Expirable, ExpirableEntry, ExpirableValue};
pub use reaper::{Reaper, ReaperConfig};
