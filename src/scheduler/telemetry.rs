//! Scheduler lifecycle events.
//!
//! The daemon publishes events on a broadcast channel. Observers are
//! fully isolated from dispatch: a slow or dropped receiver lags or
//! misses events but never blocks the loop.

use super::ticket::{Priority, TicketId};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Default broadcast ring capacity per subscriber.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Observable scheduler lifecycle transitions.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// Ticket accepted into the pending queue.
    Queued { id: TicketId, priority: Priority },
    /// Ticket handed to the transport; `attempt` is 1-based.
    Dispatched { id: TicketId, attempt: u32 },
    /// Ticket resolved with a successful response.
    Resolved { id: TicketId, attempts: u32 },
    /// Failed attempt will be retried after `delay`.
    RetryScheduled {
        id: TicketId,
        attempt: u32,
        delay: Duration,
    },
    /// Dispatch paused by the rate limiter until roughly `resume_at`.
    /// `None` means the lifetime cap is spent and dispatch will not resume.
    RateDeferred { resume_at: Option<Instant> },
    /// Ticket terminated with an error.
    Rejected { id: TicketId, error: String },
    /// Shutdown drained this many still-pending tickets.
    ShutdownDrained { pending: usize },
}

/// Fan-out publisher for [`SchedulerEvent`]s.
#[derive(Clone)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<SchedulerEvent>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publishes an event. Send errors (no live subscribers) are ignored.
    pub(crate) fn emit(&self, event: SchedulerEvent) {
        let _ = self.tx.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.tx.subscribe()
    }
}
