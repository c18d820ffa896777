//! # FlashTTL - An In-Memory Expiry Cache
//!
//! FlashTTL is an embeddable key-value cache written in Rust where every entry
//! carries a time-to-live. Reads after the TTL behave as if the entry were
//! absent, and a background reaper reclaims expired entries without scanning
//! the dataset or getting in the way of concurrent writers.
//!
//! ## Features
//!
//! - **Lazy Expiry**: `get` checks the entry's own expiration instant, O(1)
//! - **Ordered Reclamation**: A min-heap of expirations lets the reaper touch only due entries
//! - **Stale-Safe Removal**: Overwritten keys are never evicted by their old expiration
//! - **Concurrent**: Sharded storage; `put` and `get` from any number of threads
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              ExpiryCache                                │
//! │                                                                         │
//! │      put(key, value, ttl, unit)                 get(key)                │
//! │                │                                   │                    │
//! │                ▼                                   ▼                    │
//! │  ┌──────────────────────────────────────────────────────────────────┐   │
//! │  │                          ExpiryStore                             │   │
//! │  │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐   ┌──────────────┐  │   │
//! │  │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │   │ Expiration   │  │   │
//! │  │  │RwLock  │ │RwLock  │ │RwLock  │ │shards  │   │ queue (heap) │  │   │
//! │  │  └────────┘ └────────┘ └────────┘ └────────┘   └──────────────┘  │   │
//! │  └──────────────────────────────────────────────────────────────────┘   │
//! │                                               ▲                         │
//! │                                               │                         │
//! │                     ┌─────────────────────────┴───────────────────────┐ │
//! │                     │                 Reaper                          │ │
//! │                     │      (Background Tokio Task)                    │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use flashttl::{ExpiryCache, TimeUnit};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), flashttl::CacheError> {
//!     // Create the cache; its reaper starts on the current runtime
//!     let cache = ExpiryCache::new()?;
//!
//!     cache.put("token".to_string(), "abc123".to_string(), 15, TimeUnit::Minutes)?;
//!     assert_eq!(cache.get("token"), Some("abc123".to_string()));
//!
//!     // The reaper stops when the cache is dropped
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`cache`]: The public [`ExpiryCache`]
//! - [`storage`]: Expirable values, the sharded store and the reaper
//! - [`time`]: TTL units and clock sources
//! - [`error`]: The [`CacheError`] type
//!
//! ## Expiry Guarantees
//!
//! An entry is never visible after its TTL, and never hidden before it.
//! Memory is reclaimed *eventually*: within one reaper period after expiry.
//! Between those points an entry is "expired but unreaped", which no caller
//! can distinguish from absent.

pub mod cache;
pub mod error;
pub mod storage;
pub mod time;

// Re-export commonly used types for convenience
pub use cache::ExpiryCache;
pub use error::{CacheError, CacheResult};
pub use storage::{CacheStats, ReapOutcome, ReaperConfig};
pub use time::{Clock, ManualClock, SystemClock, TimeUnit};

/// Version of FlashTTL
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
