//! Per-endpoint health metrics.
//!
//! The [`EndpointHealthTracker`] consumes outcome events from the scheduler
//! and produces advisory health verdicts. It never gates dispatch;
//! consumers (e.g. a status-check feature) poll it.
//!
//! Recording is append-only into a bounded ring buffer per endpoint.
//! Aggregation is lazy: stats are recomputed at most once per aggregation
//! period, and only samples inside the sample window participate — older
//! samples are excluded at aggregation time, not deleted.

use crate::config::{HealthConfig, HealthThresholds};
use crate::health::ring::RingBuffer;
use dashmap::DashMap;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Kind of a recorded request outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// The attempt returned a 2xx response.
    Success,
    /// The attempt failed (transport error or non-2xx status).
    Error,
    /// The attempt was aborted by its deadline.
    Timeout,
}

/// One recorded outcome.
#[derive(Debug, Clone, Copy)]
struct OutcomeSample {
    at: Instant,
    kind: OutcomeKind,
    latency: Duration,
}

/// Aggregated statistics for one endpoint, derived from in-window samples.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EndpointStats {
    /// Samples inside the aggregation window.
    pub sample_count: usize,
    /// Average latency over in-window successful samples.
    pub avg_latency: Duration,
    /// Fraction of in-window samples that were errors.
    pub error_rate: f64,
    /// Fraction of in-window samples that were timeouts.
    pub timeout_rate: f64,
    /// Fraction of in-window samples that succeeded.
    pub availability: f64,
}

/// A specific way an endpoint is unhealthy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HealthIssue {
    /// Average success latency exceeds the configured threshold.
    SlowResponses { avg: Duration, limit: Duration },
    /// Error fraction exceeds the configured threshold.
    HighErrorRate { rate: f64, limit: f64 },
    /// Timeout fraction exceeds the configured threshold.
    HighTimeoutRate { rate: f64, limit: f64 },
}

impl std::fmt::Display for HealthIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SlowResponses { avg, limit } => {
                write!(f, "slow responses: avg {:?} exceeds {:?}", avg, limit)
            }
            Self::HighErrorRate { rate, limit } => {
                write!(f, "high error rate: {:.2} exceeds {:.2}", rate, limit)
            }
            Self::HighTimeoutRate { rate, limit } => {
                write!(f, "high timeout rate: {:.2} exceeds {:.2}", rate, limit)
            }
        }
    }
}

/// Advisory health verdict for one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    /// True when no threshold is violated.
    pub healthy: bool,
    /// The specific violated thresholds, empty when healthy.
    pub issues: Vec<HealthIssue>,
    /// The aggregated stats the verdict was derived from.
    pub stats: EndpointStats,
}

/// Per-endpoint sample log plus its cached aggregate.
struct EndpointMetric {
    samples: RingBuffer<OutcomeSample>,
    stats: EndpointStats,
    aggregated_at: Option<Instant>,
}

impl EndpointMetric {
    fn new(capacity: usize) -> Self {
        Self {
            samples: RingBuffer::new(capacity),
            stats: EndpointStats::default(),
            aggregated_at: None,
        }
    }

    /// Recomputes stats from in-window samples if the aggregation period
    /// has elapsed (or aggregation never ran). `force` bypasses the period.
    fn aggregate(&mut self, now: Instant, config: &HealthConfig, force: bool) {
        let due = match self.aggregated_at {
            None => true,
            Some(at) => now.duration_since(at) >= config.aggregation_period(),
        };
        if !due && !force {
            return;
        }

        let window = config.sample_window();
        let mut total = 0usize;
        let mut successes = 0usize;
        let mut errors = 0usize;
        let mut timeouts = 0usize;
        let mut success_latency = Duration::ZERO;

        for sample in self.samples.iter() {
            if now.duration_since(sample.at) > window {
                continue;
            }
            total += 1;
            match sample.kind {
                OutcomeKind::Success => {
                    successes += 1;
                    success_latency += sample.latency;
                }
                OutcomeKind::Error => errors += 1,
                OutcomeKind::Timeout => timeouts += 1,
            }
        }

        self.stats = if total == 0 {
            EndpointStats::default()
        } else {
            EndpointStats {
                sample_count: total,
                avg_latency: if successes > 0 {
                    success_latency / successes as u32
                } else {
                    Duration::ZERO
                },
                error_rate: errors as f64 / total as f64,
                timeout_rate: timeouts as f64 / total as f64,
                availability: successes as f64 / total as f64,
            }
        };
        self.aggregated_at = Some(now);
    }
}

/// Sliding-window sample aggregator producing per-endpoint health verdicts.
///
/// Append-only from the scheduler's perspective; health queries never
/// mutate the sample log.
pub struct EndpointHealthTracker {
    endpoints: DashMap<String, EndpointMetric>,
    config: HealthConfig,
}

impl EndpointHealthTracker {
    /// Creates a tracker with the given sampling configuration.
    pub fn new(config: HealthConfig) -> Self {
        Self {
            endpoints: DashMap::new(),
            config,
        }
    }

    /// Appends one outcome sample for `endpoint`.
    ///
    /// Opportunistically re-aggregates when the aggregation period has
    /// elapsed, so stats stay warm without a health query.
    pub fn record_outcome(&self, endpoint: &str, kind: OutcomeKind, latency: Duration) {
        let now = Instant::now();
        let mut metric = self
            .endpoints
            .entry(endpoint.to_string())
            .or_insert_with(|| EndpointMetric::new(self.config.sample_capacity()));

        metric.samples.push(OutcomeSample { at: now, kind, latency });
        metric.aggregate(now, &self.config, false);
    }

    /// Returns the health verdict for `endpoint`, or `None` if the
    /// endpoint has never been seen.
    ///
    /// Forces a fresh aggregation so the verdict reflects the current
    /// window.
    pub fn health(&self, endpoint: &str) -> Option<HealthReport> {
        let now = Instant::now();
        let mut metric = self.endpoints.get_mut(endpoint)?;
        metric.aggregate(now, &self.config, true);

        let stats = metric.stats;
        let issues = Self::evaluate(&stats, &self.config.thresholds());
        Some(HealthReport {
            healthy: issues.is_empty(),
            issues,
            stats,
        })
    }

    /// Snapshot of aggregated stats for every known endpoint.
    pub fn all_stats(&self) -> HashMap<String, EndpointStats> {
        let now = Instant::now();
        self.endpoints
            .iter_mut()
            .map(|mut entry| {
                entry.value_mut().aggregate(now, &self.config, false);
                (entry.key().clone(), entry.value().stats)
            })
            .collect()
    }

    fn evaluate(stats: &EndpointStats, thresholds: &HealthThresholds) -> Vec<HealthIssue> {
        let mut issues = Vec::new();
        if stats.sample_count == 0 {
            return issues;
        }
        if stats.avg_latency > thresholds.max_avg_latency {
            issues.push(HealthIssue::SlowResponses {
                avg: stats.avg_latency,
                limit: thresholds.max_avg_latency,
            });
        }
        if stats.error_rate > thresholds.max_error_rate {
            issues.push(HealthIssue::HighErrorRate {
                rate: stats.error_rate,
                limit: thresholds.max_error_rate,
            });
        }
        if stats.timeout_rate > thresholds.max_timeout_rate {
            issues.push(HealthIssue::HighTimeoutRate {
                rate: stats.timeout_rate,
                limit: thresholds.max_timeout_rate,
            });
        }
        issues
    }
}
