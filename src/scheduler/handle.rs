//! Cloneable handle to a running scheduler daemon.

use super::daemon::{Command, SchedulerDaemon, SchedulerStats, SchedulerStatsSnapshot};
use super::telemetry::{EventBus, SchedulerEvent};
use super::ticket::{RequestSpec, RequestTicket, TicketId};
use crate::cache::CacheStore;
use crate::cache::Storage;
use crate::config::{RateLimitConfig, RetryConfig, SchedulerConfig};
use crate::error::RequestError;
use crate::health::EndpointHealthTracker;
use crate::ratelimit::RateLimiter;
use crate::retry::RetryPolicy;
use crate::transport::{Response, Transport};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Handle to the scheduler daemon. Cheap to clone; dropping every clone
/// stops the daemon and drains its queue.
#[derive(Clone)]
pub struct RequestScheduler {
    cmd_tx: mpsc::UnboundedSender<Command>,
    stats: Arc<SchedulerStats>,
    events: EventBus,
    cancel: CancellationToken,
}

impl RequestScheduler {
    /// Spawns the daemon task and returns its handle.
    ///
    /// `cache` enables write-through of successful bodies for tickets
    /// carrying a cache key; pass `None` to run without one.
    pub fn spawn<T, S>(
        scheduler: SchedulerConfig,
        rate: RateLimitConfig,
        retry: RetryConfig,
        transport: Arc<T>,
        cache: Option<Arc<CacheStore<S>>>,
        health: Arc<EndpointHealthTracker>,
    ) -> Self
    where
        T: Transport + 'static,
        S: Storage + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(SchedulerStats::default());
        let events = EventBus::new();
        let cancel = CancellationToken::new();

        let limiter = RateLimiter::new(rate, Instant::now().into_std());
        let daemon = SchedulerDaemon::new(
            scheduler,
            limiter,
            RetryPolicy::new(retry),
            transport,
            cache,
            health,
            cmd_tx.clone(),
            cmd_rx,
            Arc::clone(&stats),
            events.clone(),
        );
        tokio::spawn(daemon.run(cancel.clone()));

        Self {
            cmd_tx,
            stats,
            events,
            cancel,
        }
    }

    /// Submits a request and waits for its terminal outcome.
    ///
    /// Resolves with the successful response, or the terminal error after
    /// queueing, rate gating, and retries have run their course. A request
    /// submitted after shutdown fails with [`RequestError::Shutdown`].
    pub async fn submit(&self, spec: RequestSpec) -> Result<Response, RequestError> {
        let id = TicketId(self.stats.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let (tx, rx) = oneshot::channel();
        let ticket = RequestTicket::new(id, spec, tx);
        self.cmd_tx
            .send(Command::Submit(ticket))
            .map_err(|_| RequestError::Shutdown)?;
        rx.await.map_err(|_| RequestError::Shutdown)?
    }

    /// Subscribes to scheduler lifecycle events. Each receiver is
    /// independent; lagging never stalls dispatch.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    /// Current counter snapshot.
    pub fn stats(&self) -> SchedulerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stops the daemon. Pending tickets are rejected with
    /// [`RequestError::Shutdown`]; in-flight attempts are abandoned.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}
