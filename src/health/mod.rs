//! Endpoint health metrics aggregation.
//!
//! The scheduler records one outcome sample per completed attempt; this
//! module aggregates those samples into advisory per-endpoint health
//! verdicts. Health never gates dispatch.

mod ring;
mod tracker;

pub use ring::RingBuffer;
pub use tracker::{
    EndpointHealthTracker, EndpointStats, HealthIssue, HealthReport, OutcomeKind,
};
