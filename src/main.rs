//! FlashTTL - An In-Memory Expiry Cache
//!
//! This is a demo entry point. It replays the four-key expiry scenario
//! against a live cache and reports what `get` observes at each checkpoint.

use anyhow::bail;
use bytes::Bytes;
use flashttl::{ExpiryCache, ReaperConfig, TimeUnit};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// (key, value, TTL in milliseconds before scaling)
const SCENARIO: [(&str, &str, i64); 4] = [
    ("key1", "value1", 10_000),
    ("key2", "value2", 5_000),
    ("key3", "value3", 10_000),
    ("key4", "value4", 5_000),
];

/// Checkpoints in milliseconds before scaling
const CHECKPOINTS: [u64; 3] = [0, 5_000, 10_000];

/// Longest TTL or checkpoint in the scenario, before scaling
const LONGEST_MS: u64 = 10_000;

/// Demo configuration
struct Config {
    /// Delay before the reaper's first cycle
    initial_delay: Duration,
    /// Interval between reaper cycles
    period: Duration,
    /// Multiplier applied to every TTL and checkpoint
    scale: f64,
}

impl Default for Config {
    fn default() -> Self {
        let reaper = ReaperConfig::default();
        Self {
            initial_delay: reaper.initial_delay,
            period: reaper.period,
            scale: 1.0,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--initial-delay-ms" => {
                    config.initial_delay = Duration::from_millis(parse_value(&args, i));
                    i += 2;
                }
                "--period-ms" => {
                    config.period = Duration::from_millis(parse_value(&args, i));
                    i += 2;
                }
                "--scale" | "-s" => {
                    config.scale = parse_value(&args, i);
                    if !(config.scale.is_finite() && config.scale > 0.0) {
                        eprintln!("Error: --scale must be a positive number");
                        std::process::exit(1);
                    }
                    if let Err(e) = config.scaled(LONGEST_MS) {
                        eprintln!("Error: --scale {} is too large: {}", config.scale, e);
                        std::process::exit(1);
                    }
                    i += 2;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("FlashTTL version {}", flashttl::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    fn reaper(&self) -> ReaperConfig {
        ReaperConfig::new(self.initial_delay, self.period)
    }

    fn scaled(&self, millis: u64) -> anyhow::Result<Duration> {
        let scaled = Duration::try_from_secs_f64(millis as f64 * self.scale / 1000.0)?;
        if Instant::now().checked_add(scaled).is_none() {
            bail!("{:?} cannot be scheduled", scaled);
        }
        Ok(scaled)
    }
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize) -> T {
    let Some(raw) = args.get(i + 1) else {
        eprintln!("Error: {} requires a value", args[i]);
        std::process::exit(1);
    };
    raw.parse().unwrap_or_else(|_| {
        eprintln!("Error: invalid value for {}: {}", args[i], raw);
        std::process::exit(1);
    })
}

fn print_help() {
    println!(
        r#"
FlashTTL - An In-Memory Expiry Cache (demo)

USAGE:
    flashttl [OPTIONS]

OPTIONS:
        --initial-delay-ms <MS>  Delay before the first reaper cycle (default: 1000)
        --period-ms <MS>         Interval between reaper cycles (default: 2000)
    -s, --scale <FACTOR>         Multiply every TTL and checkpoint (default: 1.0)
    -v, --version                Print version information
    -h, --help                   Print this help message

The demo puts four keys with TTLs of 10s, 5s, 10s and 5s, then reads them
back immediately, after 5s and after 10s.

EXAMPLES:
    flashttl                     # Full-length run (about 12 seconds)
    flashttl --scale 0.1 --period-ms 100
"#
    );
}

/// Whether a key put with `ttl` should still be visible at `checkpoint`.
fn expected_at(checkpoint: u64, ttl: i64) -> bool {
    (checkpoint as i64) < ttl
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging, honouring RUST_LOG when present
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let cache: Arc<ExpiryCache<String, Bytes>> =
        Arc::new(ExpiryCache::with_config(config.reaper())?);

    // Put every key from its own task
    let puts: Vec<_> = SCENARIO
        .iter()
        .map(|&(key, value, ttl)| {
            let cache = Arc::clone(&cache);
            let ttl = config
                .scaled(ttl as u64)
                .and_then(|d| Ok(i64::try_from(d.as_millis())?));
            tokio::spawn(async move {
                let ttl = ttl?;
                let value = Bytes::from_static(value.as_bytes());
                cache.put(key.to_string(), value, ttl, TimeUnit::Milliseconds)?;
                info!(key, ttl_ms = ttl, "Put value into cache");
                anyhow::Ok(())
            })
        })
        .collect();
    for put in puts {
        put.await??;
    }

    let start = Instant::now();
    let mut mismatches = 0;

    for checkpoint in CHECKPOINTS {
        sleep_until(start + config.scaled(checkpoint)?).await;

        for &(key, value, ttl) in &SCENARIO {
            let actual = cache.get(key);
            let expected =
                expected_at(checkpoint, ttl).then(|| Bytes::from_static(value.as_bytes()));

            if actual == expected {
                info!(key, checkpoint_ms = checkpoint, ?actual, "Observed expected value");
            } else {
                warn!(key, checkpoint_ms = checkpoint, ?expected, ?actual, "Unexpected value");
                mismatches += 1;
            }
        }
    }

    // Give the reaper one more cycle to reclaim everything
    tokio::time::sleep(config.period.saturating_add(config.initial_delay)).await;
    let stats = cache.stats();
    info!(
        entries = stats.entries,
        pending = stats.pending,
        reaped = stats.reaped,
        hits = stats.hits,
        misses = stats.misses,
        "Final cache statistics"
    );

    cache.shutdown();

    if mismatches > 0 {
        bail!("{} observation(s) did not match the expiry schedule", mismatches);
    }

    info!("All observations matched");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_durations() {
        let config = Config {
            scale: 0.5,
            ..Config::default()
        };
        assert_eq!(config.scaled(5_000).unwrap(), Duration::from_millis(2_500));
    }

    #[test]
    fn test_huge_scale_is_an_error() {
        let config = Config {
            scale: 1e300,
            ..Config::default()
        };
        assert!(config.scaled(LONGEST_MS).is_err());
    }

    #[test]
    fn test_expected_at_checkpoints() {
        assert!(expected_at(0, 5_000));
        assert!(!expected_at(5_000, 5_000));
        assert!(expected_at(5_000, 10_000));
    }
}
