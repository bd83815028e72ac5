//! The scheduler daemon: a single task owning queue, limiter, and retry
//! decisions.
//!
//! All scheduling state is confined to this task, so no locks guard the
//! queue or the rate windows. Attempts run as spawned tasks and report
//! back over a completion channel:
//!
//! ```text
//!  submit ──> cmd_rx ──> pending queue ──> dispatch ──> spawned attempt
//!                ^                            |              |
//!                └── Requeue (after backoff) ─┴── completion_rx
//! ```
//!
//! Dispatch stops at whichever bound bites first: `max_concurrent` active
//! attempts, or a rate window with no headroom. A rate rejection parks the
//! loop on a wake timer at the limiter's earliest reset.

use super::queue::PendingQueue;
use super::telemetry::{EventBus, SchedulerEvent};
use super::ticket::RequestTicket;
use crate::cache::{CacheStore, Storage};
use crate::config::SchedulerConfig;
use crate::error::RequestError;
use crate::health::{EndpointHealthTracker, OutcomeKind};
use crate::ratelimit::RateLimiter;
use crate::retry::RetryPolicy;
use crate::transport::{Response, Transport};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Longest error-body prefix kept in `RequestError::Http`.
const ERROR_BODY_PREVIEW_CHARS: usize = 200;

/// Messages into the daemon loop.
pub(crate) enum Command {
    /// New submission from a handle.
    Submit(RequestTicket),
    /// Failed ticket returning to the queue after its backoff delay.
    Requeue(RequestTicket),
}

/// A finished attempt, carrying its ticket back to the loop.
struct Completion {
    ticket: RequestTicket,
    outcome: Result<Response, RequestError>,
    latency: Duration,
}

/// Shared counters, updated by the daemon and read by handles.
#[derive(Default)]
pub(crate) struct SchedulerStats {
    pub(crate) submitted: AtomicU64,
    pub(crate) resolved: AtomicU64,
    pub(crate) rejected: AtomicU64,
    pub(crate) retries: AtomicU64,
    pub(crate) rate_deferrals: AtomicU64,
    pub(crate) queued: AtomicUsize,
    pub(crate) active: AtomicUsize,
    pub(crate) peak_active: AtomicUsize,
    pub(crate) next_id: AtomicU64,
}

impl SchedulerStats {
    /// Bumps the active gauge and folds the new value into the peak.
    fn enter_active(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let mut peak = self.peak_active.load(Ordering::SeqCst);
        while now > peak {
            match self.peak_active.compare_exchange_weak(
                peak,
                now,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(current) => peak = current,
            }
        }
    }

    fn leave_active(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn snapshot(&self) -> SchedulerStatsSnapshot {
        SchedulerStatsSnapshot {
            submitted: self.submitted.load(Ordering::SeqCst),
            resolved: self.resolved.load(Ordering::SeqCst),
            rejected: self.rejected.load(Ordering::SeqCst),
            retries: self.retries.load(Ordering::SeqCst),
            rate_deferrals: self.rate_deferrals.load(Ordering::SeqCst),
            queued: self.queued.load(Ordering::SeqCst),
            active: self.active.load(Ordering::SeqCst),
            peak_active: self.peak_active.load(Ordering::SeqCst),
        }
    }
}

/// Point-in-time view of scheduler counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStatsSnapshot {
    /// Tickets accepted into the queue.
    pub submitted: u64,
    /// Tickets terminated with a successful response.
    pub resolved: u64,
    /// Tickets terminated with an error (including shutdown drains).
    pub rejected: u64,
    /// Retry attempts scheduled.
    pub retries: u64,
    /// Times dispatch paused on a full rate window.
    pub rate_deferrals: u64,
    /// Tickets currently pending.
    pub queued: usize,
    /// Attempts currently in flight.
    pub active: usize,
    /// High-water mark of in-flight attempts.
    pub peak_active: usize,
}

pub(crate) struct SchedulerDaemon<T, S: Storage> {
    config: SchedulerConfig,
    transport: Arc<T>,
    cache: Option<Arc<CacheStore<S>>>,
    health: Arc<EndpointHealthTracker>,
    policy: RetryPolicy,
    limiter: RateLimiter,
    pending: PendingQueue,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    /// Kept for the delayed-requeue tasks the daemon itself spawns.
    cmd_tx: mpsc::UnboundedSender<Command>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    stats: Arc<SchedulerStats>,
    events: EventBus,
    /// When dispatch is rate-parked, the instant to try again.
    rate_wake_at: Option<Instant>,
}

impl<T, S> SchedulerDaemon<T, S>
where
    T: Transport + 'static,
    S: Storage + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: SchedulerConfig,
        limiter: RateLimiter,
        policy: RetryPolicy,
        transport: Arc<T>,
        cache: Option<Arc<CacheStore<S>>>,
        health: Arc<EndpointHealthTracker>,
        cmd_tx: mpsc::UnboundedSender<Command>,
        cmd_rx: mpsc::UnboundedReceiver<Command>,
        stats: Arc<SchedulerStats>,
        events: EventBus,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            config,
            transport,
            cache,
            health,
            policy,
            limiter,
            pending: PendingQueue::new(),
            cmd_rx,
            cmd_tx,
            completion_tx,
            completion_rx,
            stats,
            events,
            rate_wake_at: None,
        }
    }

    /// Runs the loop until `cancel` fires or every handle is dropped.
    pub(crate) async fn run(mut self, cancel: CancellationToken) {
        info!(
            max_concurrent = self.config.max_concurrent(),
            "Request scheduler started"
        );
        loop {
            self.dispatch();
            let rate_wake = self.rate_wake_at;
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.drain_pending();
                    break;
                }
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Submit(ticket)) => self.handle_submit(ticket),
                    Some(Command::Requeue(ticket)) => {
                        self.stats.queued.fetch_add(1, Ordering::SeqCst);
                        self.pending.push_back(ticket);
                    }
                    None => {
                        self.drain_pending();
                        break;
                    }
                },
                Some(done) = self.completion_rx.recv() => self.handle_completion(done),
                _ = sleep_until_opt(rate_wake), if rate_wake.is_some() => {
                    self.rate_wake_at = None;
                }
            }
        }
        info!("Request scheduler stopped");
    }

    fn handle_submit(&mut self, ticket: RequestTicket) {
        if let Some(limit) = self.config.max_queue_size() {
            if self.pending.len() >= limit {
                warn!(id = %ticket.id, limit, "Pending queue full, rejecting submission");
                self.stats.rejected.fetch_add(1, Ordering::SeqCst);
                ticket.reject(RequestError::CapacityExceeded { limit });
                return;
            }
        }
        self.stats.submitted.fetch_add(1, Ordering::SeqCst);
        self.stats.queued.fetch_add(1, Ordering::SeqCst);
        self.events.emit(SchedulerEvent::Queued {
            id: ticket.id,
            priority: ticket.priority,
        });
        self.pending.push_back(ticket);
    }

    /// Starts attempts until a bound bites. Called before every select
    /// wait, so any state change that frees a slot re-runs it.
    fn dispatch(&mut self) {
        while self.stats.active.load(Ordering::SeqCst) < self.config.max_concurrent() {
            let Some(ticket) = self.pending.pop() else {
                break;
            };
            if !self.limiter.try_reserve(Instant::now().into_std()) {
                let resume_at = self.limiter.retry_at().map(Instant::from_std);
                debug!(id = %ticket.id, "Rate window full, parking dispatch");
                self.pending.push_front(ticket);
                self.stats.rate_deferrals.fetch_add(1, Ordering::SeqCst);
                self.rate_wake_at = resume_at;
                self.events.emit(SchedulerEvent::RateDeferred { resume_at });
                break;
            }
            self.stats.queued.fetch_sub(1, Ordering::SeqCst);
            self.start_attempt(ticket);
        }
    }

    fn start_attempt(&self, ticket: RequestTicket) {
        self.stats.enter_active();
        debug!(
            id = %ticket.id,
            priority = %ticket.priority,
            attempt = ticket.attempt + 1,
            queued_ms = ticket.enqueued_at.elapsed().as_millis() as u64,
            "Dispatching request"
        );
        self.events.emit(SchedulerEvent::Dispatched {
            id: ticket.id,
            attempt: ticket.attempt + 1,
        });
        let transport = Arc::clone(&self.transport);
        let completions = self.completion_tx.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let outcome =
                match tokio::time::timeout(ticket.timeout, transport.send(&ticket.target)).await {
                    Ok(Ok(response)) if response.is_success() => Ok(response),
                    Ok(Ok(response)) => Err(RequestError::Http {
                        status: response.status,
                        message: String::from_utf8_lossy(&response.body)
                            .chars()
                            .take(ERROR_BODY_PREVIEW_CHARS)
                            .collect(),
                    }),
                    Ok(Err(e)) => Err(e.into()),
                    Err(_) => Err(RequestError::Timeout(ticket.timeout)),
                };
            let latency = started.elapsed();
            // Only fails if the daemon already stopped; the submitter then
            // observes a dropped responder.
            let _ = completions.send(Completion {
                ticket,
                outcome,
                latency,
            });
        });
    }

    fn handle_completion(&mut self, done: Completion) {
        self.stats.leave_active();
        let Completion {
            mut ticket,
            outcome,
            latency,
        } = done;
        match outcome {
            Ok(response) => {
                self.health
                    .record_outcome(&ticket.endpoint, OutcomeKind::Success, latency);
                if let (Some(key), Some(cache)) = (ticket.cache_key.clone(), &self.cache) {
                    let cache = Arc::clone(cache);
                    let body = response.body.clone();
                    let ttl = ticket.cache_ttl;
                    tokio::spawn(async move {
                        cache.set(&key, body, ttl).await;
                    });
                }
                self.stats.resolved.fetch_add(1, Ordering::SeqCst);
                self.events.emit(SchedulerEvent::Resolved {
                    id: ticket.id,
                    attempts: ticket.attempt + 1,
                });
                ticket.resolve(response);
            }
            Err(error) => {
                let kind = if matches!(error, RequestError::Timeout(_)) {
                    OutcomeKind::Timeout
                } else {
                    OutcomeKind::Error
                };
                self.health.record_outcome(&ticket.endpoint, kind, latency);
                ticket.attempt += 1;

                if error.is_auth_challenge() {
                    // Credential refresh and replay belong to the caller;
                    // retrying with the same token cannot succeed.
                    self.reject_terminal(ticket, error);
                    return;
                }

                let decision = self.policy.decide(&error, ticket.attempt);
                if decision.retry {
                    debug!(
                        id = %ticket.id,
                        attempt = ticket.attempt,
                        delay_ms = decision.delay.as_millis() as u64,
                        %error,
                        "Attempt failed, scheduling retry"
                    );
                    self.stats.retries.fetch_add(1, Ordering::SeqCst);
                    self.events.emit(SchedulerEvent::RetryScheduled {
                        id: ticket.id,
                        attempt: ticket.attempt,
                        delay: decision.delay,
                    });
                    let requeue = self.cmd_tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(decision.delay).await;
                        let _ = requeue.send(Command::Requeue(ticket));
                    });
                } else if error.is_retryable() {
                    // Retryable class but the attempt budget is spent.
                    let attempts = ticket.attempt;
                    self.reject_terminal(
                        ticket,
                        RequestError::Exhausted {
                            attempts,
                            last: Box::new(error),
                        },
                    );
                } else {
                    self.reject_terminal(ticket, error);
                }
            }
        }
    }

    fn reject_terminal(&self, ticket: RequestTicket, error: RequestError) {
        warn!(id = %ticket.id, endpoint = %ticket.endpoint, %error, "Request failed");
        self.stats.rejected.fetch_add(1, Ordering::SeqCst);
        self.events.emit(SchedulerEvent::Rejected {
            id: ticket.id,
            error: error.to_string(),
        });
        ticket.reject(error);
    }

    /// Rejects every still-pending ticket so no submitter hangs across
    /// shutdown. In-flight attempts finish in their spawned tasks; their
    /// submitters observe the dropped completion channel.
    fn drain_pending(&mut self) {
        let drained = self.pending.drain();
        if !drained.is_empty() {
            warn!(pending = drained.len(), "Shutdown draining pending tickets");
        }
        self.events.emit(SchedulerEvent::ShutdownDrained {
            pending: drained.len(),
        });
        for ticket in drained {
            self.stats.queued.fetch_sub(1, Ordering::SeqCst);
            self.stats.rejected.fetch_add(1, Ordering::SeqCst);
            ticket.reject(RequestError::Shutdown);
        }
    }
}

/// Sleeps until `at`, or forever when `None`. Only polled under a
/// `select!` guard that checks for `Some`.
async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_tracks_high_water_mark() {
        let stats = SchedulerStats::default();
        stats.enter_active();
        stats.enter_active();
        stats.enter_active();
        stats.leave_active();
        stats.leave_active();
        let snap = stats.snapshot();
        assert_eq!(snap.active, 1);
        assert_eq!(snap.peak_active, 3);
    }

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = SchedulerStats::default();
        stats.submitted.fetch_add(5, Ordering::SeqCst);
        stats.resolved.fetch_add(3, Ordering::SeqCst);
        stats.retries.fetch_add(2, Ordering::SeqCst);
        let snap = stats.snapshot();
        assert_eq!(snap.submitted, 5);
        assert_eq!(snap.resolved, 3);
        assert_eq!(snap.retries, 2);
        assert_eq!(snap.rejected, 0);
    }
}
