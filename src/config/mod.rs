//! Configuration for the orchestration pipeline.
//!
//! Each component takes a small `Copy`/`Clone` config struct with builder
//! methods and sensible defaults; [`ClientConfig`] groups them for the
//! facade.
//!
//! # Example
//!
//! ```
//! use ordergate::config::{ClientConfig, RetryConfig};
//! use std::time::Duration;
//!
//! let config = ClientConfig::default()
//!     .with_retry(
//!         RetryConfig::new()
//!             .with_max_attempts(5)
//!             .with_initial_delay(Duration::from_millis(100)),
//!     );
//! assert_eq!(config.retry.max_attempts(), 5);
//! ```

pub mod defaults;

use defaults::*;
use std::time::Duration;

/// Scheduler concurrency and queue bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    max_concurrent: usize,
    max_queue_size: Option<usize>,
}

impl SchedulerConfig {
    /// Create a scheduler configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of simultaneous in-flight network calls.
    ///
    /// Bounds logical concurrency only; queue depth is governed separately
    /// by [`with_max_queue_size`](Self::with_max_queue_size).
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Set the pending-queue ceiling, or `None` for an unbounded queue.
    ///
    /// Submissions beyond the ceiling are rejected with a capacity error.
    pub fn with_max_queue_size(mut self, max: Option<usize>) -> Self {
        self.max_queue_size = max;
        self
    }

    /// Maximum simultaneous in-flight network calls.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Pending-queue ceiling, if bounded.
    pub fn max_queue_size(&self) -> Option<usize> {
        self.max_queue_size
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            max_queue_size: Some(DEFAULT_MAX_QUEUE_SIZE),
        }
    }
}

/// Rolling-window rate ceilings. A `None` window does not gate dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    per_second: Option<u32>,
    per_minute: Option<u32>,
    per_hour: Option<u32>,
    lifetime: Option<u64>,
}

impl RateLimitConfig {
    /// Create a rate limit configuration with default ceilings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration with every window disabled.
    pub fn unlimited() -> Self {
        Self {
            per_second: None,
            per_minute: None,
            per_hour: None,
            lifetime: None,
        }
    }

    /// Set the per-second ceiling.
    pub fn with_per_second(mut self, ceiling: Option<u32>) -> Self {
        self.per_second = ceiling;
        self
    }

    /// Set the per-minute ceiling.
    pub fn with_per_minute(mut self, ceiling: Option<u32>) -> Self {
        self.per_minute = ceiling;
        self
    }

    /// Set the per-hour ceiling.
    pub fn with_per_hour(mut self, ceiling: Option<u32>) -> Self {
        self.per_hour = ceiling;
        self
    }

    /// Set the lifetime cap. Once reached, dispatch stops permanently.
    pub fn with_lifetime(mut self, cap: Option<u64>) -> Self {
        self.lifetime = cap;
        self
    }

    /// Per-second ceiling, if enabled.
    pub fn per_second(&self) -> Option<u32> {
        self.per_second
    }

    /// Per-minute ceiling, if enabled.
    pub fn per_minute(&self) -> Option<u32> {
        self.per_minute
    }

    /// Per-hour ceiling, if enabled.
    pub fn per_hour(&self) -> Option<u32> {
        self.per_hour
    }

    /// Lifetime cap, if enabled.
    pub fn lifetime(&self) -> Option<u64> {
        self.lifetime
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: Some(DEFAULT_RATE_PER_SECOND),
            per_minute: Some(DEFAULT_RATE_PER_MINUTE),
            per_hour: Some(DEFAULT_RATE_PER_HOUR),
            lifetime: None,
        }
    }
}

/// Retry budget and exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_factor: f64,
}

impl RetryConfig {
    /// Create a retry configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total attempt budget (first attempt + retries).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the delay before the first retry.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the backoff delay ceiling.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the multiplier applied per successive retry.
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Total attempt budget.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the first retry.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Backoff delay ceiling.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Backoff multiplier.
    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_RETRY_DELAY,
            max_delay: DEFAULT_MAX_RETRY_DELAY,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

/// Cache freshness, stale-grace, and sweep cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    default_ttl: Duration,
    stale_grace_multiplier: u32,
    sweep_interval: Duration,
}

impl CacheConfig {
    /// Create a cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the freshness window used when the caller does not specify one.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the grace multiple: the sweep removes entries once their age
    /// exceeds `ttl * multiplier`. Expired-but-in-grace entries remain
    /// available for stale reads.
    pub fn with_stale_grace_multiplier(mut self, multiplier: u32) -> Self {
        self.stale_grace_multiplier = multiplier;
        self
    }

    /// Set how often the sweeper daemon runs.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Default freshness window.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Stale grace multiple.
    pub fn stale_grace_multiplier(&self) -> u32 {
        self.stale_grace_multiplier
    }

    /// Sweep cadence.
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_CACHE_TTL,
            stale_grace_multiplier: DEFAULT_STALE_GRACE_MULTIPLIER,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Verdict thresholds for endpoint health.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthThresholds {
    /// Average success latency above this marks the endpoint slow.
    pub max_avg_latency: Duration,
    /// In-window error fraction above this marks the endpoint erroring.
    pub max_error_rate: f64,
    /// In-window timeout fraction above this marks the endpoint timing out.
    pub max_timeout_rate: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            max_avg_latency: DEFAULT_HEALTH_MAX_AVG_LATENCY,
            max_error_rate: DEFAULT_HEALTH_MAX_ERROR_RATE,
            max_timeout_rate: DEFAULT_HEALTH_MAX_TIMEOUT_RATE,
        }
    }
}

/// Sample retention and aggregation cadence for endpoint health.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthConfig {
    sample_capacity: usize,
    sample_window: Duration,
    aggregation_period: Duration,
    thresholds: HealthThresholds,
}

impl HealthConfig {
    /// Create a health configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-endpoint ring-buffer capacity.
    pub fn with_sample_capacity(mut self, capacity: usize) -> Self {
        self.sample_capacity = capacity;
        self
    }

    /// Set the window of samples included in aggregation.
    pub fn with_sample_window(mut self, window: Duration) -> Self {
        self.sample_window = window;
        self
    }

    /// Set how often aggregated stats are recomputed at most.
    pub fn with_aggregation_period(mut self, period: Duration) -> Self {
        self.aggregation_period = period;
        self
    }

    /// Set the verdict thresholds.
    pub fn with_thresholds(mut self, thresholds: HealthThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Per-endpoint ring-buffer capacity.
    pub fn sample_capacity(&self) -> usize {
        self.sample_capacity
    }

    /// Aggregation inclusion window.
    pub fn sample_window(&self) -> Duration {
        self.sample_window
    }

    /// Minimum period between recomputations.
    pub fn aggregation_period(&self) -> Duration {
        self.aggregation_period
    }

    /// Verdict thresholds.
    pub fn thresholds(&self) -> HealthThresholds {
        self.thresholds
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            sample_capacity: DEFAULT_HEALTH_SAMPLE_CAPACITY,
            sample_window: DEFAULT_HEALTH_SAMPLE_WINDOW,
            aggregation_period: DEFAULT_HEALTH_AGGREGATION_PERIOD,
            thresholds: HealthThresholds::default(),
        }
    }
}

/// Top-level configuration consumed by the facade.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClientConfig {
    /// Scheduler concurrency and queue bounds.
    pub scheduler: SchedulerConfig,
    /// Rate-window ceilings.
    pub rate: RateLimitConfig,
    /// Retry budget and backoff.
    pub retry: RetryConfig,
    /// Cache freshness and sweep cadence.
    pub cache: CacheConfig,
    /// Endpoint health sampling and thresholds.
    pub health: HealthConfig,
}

impl ClientConfig {
    /// Create a client configuration with default values throughout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the scheduler configuration.
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Replace the rate limit configuration.
    pub fn with_rate(mut self, rate: RateLimitConfig) -> Self {
        self.rate = rate;
        self
    }

    /// Replace the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the cache configuration.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the health configuration.
    pub fn with_health(mut self, health: HealthConfig) -> Self {
        self.health = health;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_concurrent(), DEFAULT_MAX_CONCURRENT);
        assert_eq!(config.max_queue_size(), Some(DEFAULT_MAX_QUEUE_SIZE));
    }

    #[test]
    fn test_scheduler_builder() {
        let config = SchedulerConfig::new()
            .with_max_concurrent(1)
            .with_max_queue_size(None);
        assert_eq!(config.max_concurrent(), 1);
        assert_eq!(config.max_queue_size(), None);
    }

    #[test]
    fn test_rate_limit_defaults() {
        let config = RateLimitConfig::default();
        assert_eq!(config.per_second(), Some(DEFAULT_RATE_PER_SECOND));
        assert_eq!(config.per_minute(), Some(DEFAULT_RATE_PER_MINUTE));
        assert_eq!(config.per_hour(), Some(DEFAULT_RATE_PER_HOUR));
        assert_eq!(config.lifetime(), None);
    }

    #[test]
    fn test_rate_limit_unlimited() {
        let config = RateLimitConfig::unlimited();
        assert_eq!(config.per_second(), None);
        assert_eq!(config.per_minute(), None);
        assert_eq!(config.per_hour(), None);
        assert_eq!(config.lifetime(), None);
    }

    #[test]
    fn test_retry_builder_chain() {
        let config = RetryConfig::new()
            .with_max_attempts(5)
            .with_initial_delay(Duration::from_millis(50))
            .with_max_delay(Duration::from_secs(2))
            .with_backoff_factor(3.0);
        assert_eq!(config.max_attempts(), 5);
        assert_eq!(config.initial_delay(), Duration::from_millis(50));
        assert_eq!(config.max_delay(), Duration::from_secs(2));
        assert_eq!(config.backoff_factor(), 3.0);
    }

    #[test]
    fn test_cache_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.default_ttl(), DEFAULT_CACHE_TTL);
        assert_eq!(
            config.stale_grace_multiplier(),
            DEFAULT_STALE_GRACE_MULTIPLIER
        );
        assert_eq!(config.sweep_interval(), DEFAULT_SWEEP_INTERVAL);
    }

    #[test]
    fn test_health_builder() {
        let config = HealthConfig::new()
            .with_sample_capacity(10)
            .with_sample_window(Duration::from_secs(5))
            .with_thresholds(HealthThresholds {
                max_avg_latency: Duration::from_millis(100),
                max_error_rate: 0.5,
                max_timeout_rate: 0.5,
            });
        assert_eq!(config.sample_capacity(), 10);
        assert_eq!(config.sample_window(), Duration::from_secs(5));
        assert_eq!(
            config.thresholds().max_avg_latency,
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_client_config_composition() {
        let config = ClientConfig::default()
            .with_scheduler(SchedulerConfig::new().with_max_concurrent(2))
            .with_rate(RateLimitConfig::unlimited());
        assert_eq!(config.scheduler.max_concurrent(), 2);
        assert_eq!(config.rate.per_second(), None);
    }

    #[test]
    fn test_copy_semantics() {
        let config1 = RetryConfig::new().with_max_attempts(7);
        let config2 = config1; // Copy, not move
        assert_eq!(config1.max_attempts(), config2.max_attempts());
    }
}
