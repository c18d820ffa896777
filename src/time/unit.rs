//! TTL Time Units
//!
//! Every unit maps to a fixed number of nanoseconds, the cache's internal
//! resolution. The table is a `const fn` so there is nothing to register or
//! mutate at runtime.

use crate::error::{CacheError, CacheResult};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// The unit a TTL magnitude is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
    Microseconds,
    Nanoseconds,
}

impl TimeUnit {
    /// All supported units, largest first.
    pub const ALL: [TimeUnit; 7] = [
        TimeUnit::Days,
        TimeUnit::Hours,
        TimeUnit::Minutes,
        TimeUnit::Seconds,
        TimeUnit::Milliseconds,
        TimeUnit::Microseconds,
        TimeUnit::Nanoseconds,
    ];

    /// Number of nanoseconds in one of this unit.
    pub const fn nanos_per_unit(self) -> u64 {
        match self {
            TimeUnit::Days => 86_400_000_000_000,
            TimeUnit::Hours => 3_600_000_000_000,
            TimeUnit::Minutes => 60_000_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Nanoseconds => 1,
        }
    }

    /// Short suffix used for display, e.g. `ms`.
    pub const fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Days => "d",
            TimeUnit::Hours => "h",
            TimeUnit::Minutes => "m",
            TimeUnit::Seconds => "s",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Microseconds => "us",
            TimeUnit::Nanoseconds => "ns",
        }
    }

    /// Converts `ttl` of this unit into a [`Duration`].
    ///
    /// Zero and negative TTLs collapse to [`Duration::ZERO`]. Magnitudes that
    /// do not fit in a `Duration` return [`CacheError::TtlOverflow`].
    pub fn to_duration(self, ttl: i64) -> CacheResult<Duration> {
        if ttl <= 0 {
            return Ok(Duration::ZERO);
        }

        let nanos = ttl as u128 * self.nanos_per_unit() as u128;
        let secs = u64::try_from(nanos / NANOS_PER_SEC)
            .map_err(|_| CacheError::TtlOverflow { ttl, unit: self })?;

        Ok(Duration::new(secs, (nanos % NANOS_PER_SEC) as u32))
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for TimeUnit {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "d" | "day" | "days" => Ok(TimeUnit::Days),
            "h" | "hour" | "hours" => Ok(TimeUnit::Hours),
            "m" | "min" | "minute" | "minutes" => Ok(TimeUnit::Minutes),
            "s" | "sec" | "second" | "seconds" => Ok(TimeUnit::Seconds),
            "ms" | "milli" | "millis" | "millisecond" | "milliseconds" => {
                Ok(TimeUnit::Milliseconds)
            }
            "us" | "micro" | "micros" | "microsecond" | "microseconds" => {
                Ok(TimeUnit::Microseconds)
            }
            "ns" | "nano" | "nanos" | "nanosecond" | "nanoseconds" => Ok(TimeUnit::Nanoseconds),
            _ => Err(CacheError::UnknownTimeUnit(s.to_string())),
        }
    }
}
