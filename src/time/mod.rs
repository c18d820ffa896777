//! Time Module
//!
//! Time units for expressing TTLs and the clock the cache reads "now" from.
//!
//! - [`TimeUnit`]: TTL units with a fixed nanosecond scale factor each
//! - [`Clock`]: source of the current instant ([`SystemClock`] in production,
//!   [`ManualClock`] for deterministic tests)

pub mod clock;
pub mod unit;

pub use clock::{Clock, ManualClock, SystemClock};
pub use unit::TimeUnit;
