//! Request tickets: the scheduler's unit of work.
//!
//! A ticket is created at submission, lives in the pending queue, has at
//! most one in-flight dispatch at a time, and terminates in exactly one of
//! resolved or rejected. A completed ticket is never reused.

use crate::config::defaults::DEFAULT_REQUEST_TIMEOUT;
use crate::error::RequestError;
use crate::transport::{Response, Target};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Dispatch priority. Higher priorities dispatch first; within one
/// priority, first attempts are FIFO by submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Number of priority bands.
    pub(crate) const COUNT: usize = 4;

    /// Queue band index: 0 is dispatched first.
    pub(crate) fn band(self) -> usize {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Unique ticket identifier, assigned at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TicketId(pub(crate) u64);

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ticket-{}", self.0)
    }
}

/// Caller-facing description of one request submission.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// The network call to make.
    pub target: Target,
    /// Dispatch priority.
    pub priority: Priority,
    /// When present, a successful response body is written through to the
    /// cache under this key.
    pub cache_key: Option<String>,
    /// Freshness window for the write-through; cache default when `None`.
    pub cache_ttl: Option<Duration>,
    /// Per-attempt deadline.
    pub timeout: Duration,
}

impl RequestSpec {
    /// Creates a spec with medium priority, no cache key, and the default
    /// per-attempt timeout.
    pub fn new(target: Target) -> Self {
        Self {
            target,
            priority: Priority::Medium,
            cache_key: None,
            cache_ttl: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Sets the dispatch priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Enables cache write-through under `key`.
    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    /// Sets the write-through freshness window.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Sets the per-attempt deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// One submitted unit of work, owned by the scheduler.
pub(crate) struct RequestTicket {
    pub(crate) id: TicketId,
    pub(crate) target: Target,
    /// Logical endpoint for health samples (host + path).
    pub(crate) endpoint: String,
    pub(crate) priority: Priority,
    pub(crate) cache_key: Option<String>,
    pub(crate) cache_ttl: Option<Duration>,
    pub(crate) timeout: Duration,
    /// Attempts completed so far. Starts at 0; incremented once per failed
    /// dispatch. Rate deferrals are not attempts.
    pub(crate) attempt: u32,
    /// FIFO tiebreaker within a priority band (first attempts only; a
    /// retried ticket loses its original position by design).
    pub(crate) enqueued_at: Instant,
    responder: oneshot::Sender<Result<Response, RequestError>>,
}

impl RequestTicket {
    pub(crate) fn new(
        id: TicketId,
        spec: RequestSpec,
        responder: oneshot::Sender<Result<Response, RequestError>>,
    ) -> Self {
        let endpoint = spec.target.endpoint();
        Self {
            id,
            target: spec.target,
            endpoint,
            priority: spec.priority,
            cache_key: spec.cache_key,
            cache_ttl: spec.cache_ttl,
            timeout: spec.timeout,
            attempt: 0,
            enqueued_at: Instant::now(),
            responder,
        }
    }

    /// Terminates the ticket successfully. Consumes the ticket so exactly
    /// one of resolve/reject can ever fire.
    pub(crate) fn resolve(self, response: Response) {
        let _ = self.responder.send(Ok(response));
    }

    /// Terminates the ticket with an error.
    pub(crate) fn reject(self, error: RequestError) {
        let _ = self.responder.send(Err(error));
    }
}
