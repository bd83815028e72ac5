//! Default configuration values.
//!
//! All tunables carry named defaults here so the rest of the crate never
//! hard-codes magic numbers.

use std::time::Duration;

/// Maximum simultaneous in-flight network calls.
///
/// The host is resource-constrained; four parallel calls keeps the remote
/// API responsive without saturating the local network stack.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Pending-queue ceiling before submissions are rejected with a capacity
/// error. Bounds memory growth under sustained overload.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 256;

/// Per-second request ceiling.
pub const DEFAULT_RATE_PER_SECOND: u32 = 10;

/// Per-minute request ceiling.
pub const DEFAULT_RATE_PER_MINUTE: u32 = 300;

/// Per-hour request ceiling.
pub const DEFAULT_RATE_PER_HOUR: u32 = 10_000;

/// Maximum attempts per ticket (first attempt + retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay before the first retry.
pub const DEFAULT_INITIAL_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Ceiling for the exponential backoff delay.
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Multiplier applied to the retry delay on each successive attempt.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Per-attempt network deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Cache entry freshness window when the caller does not specify one.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// An expired entry stays available for stale reads until its age exceeds
/// `ttl * grace`; the sweep removes it after that.
pub const DEFAULT_STALE_GRACE_MULTIPLIER: u32 = 3;

/// How often the sweeper daemon runs.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Ring-buffer capacity per endpoint (most recent outcome samples).
pub const DEFAULT_HEALTH_SAMPLE_CAPACITY: usize = 100;

/// Only samples younger than this participate in aggregation.
pub const DEFAULT_HEALTH_SAMPLE_WINDOW: Duration = Duration::from_secs(60);

/// Aggregated stats are recomputed at most once per this period.
pub const DEFAULT_HEALTH_AGGREGATION_PERIOD: Duration = Duration::from_secs(5);

/// Average success latency above this marks the endpoint slow.
pub const DEFAULT_HEALTH_MAX_AVG_LATENCY: Duration = Duration::from_secs(2);

/// In-window error fraction above this marks the endpoint erroring.
pub const DEFAULT_HEALTH_MAX_ERROR_RATE: f64 = 0.25;

/// In-window timeout fraction above this marks the endpoint timing out.
pub const DEFAULT_HEALTH_MAX_TIMEOUT_RATE: f64 = 0.10;
