//! Error Types
//!
//! `put` and `get` have no failure modes for well-formed input. The variants
//! here cover the programmer and configuration mistakes that must fail fast
//! instead of being silently defaulted.

use crate::time::TimeUnit;
use thiserror::Error;

/// Errors produced by the cache and its reaper.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The TTL cannot be represented on the cache clock
    #[error("ttl of {ttl}{unit} overflows the cache clock")]
    TtlOverflow { ttl: i64, unit: TimeUnit },

    /// A time unit name was not recognised
    #[error("unknown time unit: {0:?}")]
    UnknownTimeUnit(String),

    /// Reaper configuration cannot be scheduled
    #[error("invalid reaper config: {0}")]
    InvalidConfig(String),

    /// The reaper was started outside of a Tokio runtime
    #[error("no tokio runtime available to host the reaper")]
    NoRuntime,
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
