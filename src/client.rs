//! Orchestrating client facade.
//!
//! One entry point composing the whole pipeline: cache-first reads,
//! credential attachment, scheduled network fetches with retry, a single
//! refresh-and-replay on 401, and stale-cache fallback when the upstream
//! has exhausted its retry budget.
//!
//! Fetch path, in order:
//! 1. fresh cache hit -> return without touching the network
//! 2. submit to the scheduler (priority, rate, retry all apply)
//! 3. HTTP 401 -> refresh credentials, replay once
//! 4. exhausted retries -> serve a stale entry still inside the grace
//!    window, if one exists
//! 5. otherwise the terminal error

use crate::auth::CredentialProvider;
use crate::cache::{run_sweeper, CacheStats, CacheStore, Storage};
use crate::config::ClientConfig;
use crate::error::RequestError;
use crate::health::{EndpointHealthTracker, EndpointStats, HealthReport};
use crate::scheduler::{
    Priority, RequestScheduler, RequestSpec, SchedulerEvent, SchedulerStatsSnapshot,
};
use crate::transport::{Method, Response, Target, Transport};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-fetch knobs. Everything defaults to the client configuration.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    priority: Option<Priority>,
    cache_key: Option<String>,
    force_refresh: bool,
    timeout: Option<Duration>,
    ttl: Option<Duration>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch priority for the network fetch, if one happens.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Overrides the cache key. GET requests default to their full URL.
    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    /// Skips the cache read. The response still writes through.
    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }

    /// Per-attempt deadline override.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Freshness window override for the write-through.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// A fetched body plus where it came from.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: Bytes,
    /// Served from the cache rather than the network.
    pub from_cache: bool,
    /// Past its freshness window; only ever true for grace-window
    /// fallbacks after a failed fetch.
    pub stale: bool,
}

/// The composed request pipeline behind a single handle.
pub struct OrchestratingClient<S: Storage, C> {
    scheduler: RequestScheduler,
    cache: Arc<CacheStore<S>>,
    health: Arc<EndpointHealthTracker>,
    credentials: Option<Arc<C>>,
    cancel: CancellationToken,
}

impl<S, C> OrchestratingClient<S, C>
where
    S: Storage + 'static,
    C: CredentialProvider,
{
    /// Builds the pipeline: hydrates the cache from `storage`, spawns the
    /// scheduler daemon and the cache sweeper.
    pub async fn new<T: Transport + 'static>(
        config: ClientConfig,
        transport: Arc<T>,
        storage: S,
        credentials: Option<Arc<C>>,
    ) -> Self {
        let cache = Arc::new(CacheStore::load(storage, config.cache).await);
        let health = Arc::new(EndpointHealthTracker::new(config.health));
        let cancel = CancellationToken::new();
        tokio::spawn(run_sweeper(Arc::clone(&cache), cancel.clone()));

        let scheduler = RequestScheduler::spawn(
            config.scheduler,
            config.rate,
            config.retry,
            transport,
            Some(Arc::clone(&cache)),
            Arc::clone(&health),
        );

        Self {
            scheduler,
            cache,
            health,
            credentials,
            cancel,
        }
    }

    /// Fetches `target`, cache first.
    pub async fn fetch(&self, target: Target, options: FetchOptions) -> Result<Fetched, RequestError> {
        let cache_key = options
            .cache_key
            .clone()
            .or_else(|| (target.method == Method::Get).then(|| target.url.clone()));

        if !options.force_refresh {
            if let Some(key) = &cache_key {
                if let Some(body) = self.cache.get(key) {
                    debug!(key = %key, "Serving fresh cache entry");
                    return Ok(Fetched {
                        body,
                        from_cache: true,
                        stale: false,
                    });
                }
            }
        }

        match self.fetch_network(target, &options, cache_key.as_deref()).await {
            Ok(response) => Ok(Fetched {
                body: response.body,
                from_cache: false,
                stale: false,
            }),
            Err(error @ RequestError::Exhausted { .. }) => {
                if let Some(body) = cache_key.as_deref().and_then(|key| self.cache.get_stale(key)) {
                    warn!(%error, "Fetch exhausted retries, serving stale cache entry");
                    return Ok(Fetched {
                        body,
                        from_cache: true,
                        stale: true,
                    });
                }
                Err(error)
            }
            Err(error) => Err(error),
        }
    }

    /// Fetches and deserializes a JSON body.
    pub async fn fetch_json<D: DeserializeOwned>(
        &self,
        target: Target,
        options: FetchOptions,
    ) -> Result<D, RequestError> {
        let fetched = self.fetch(target, options).await?;
        serde_json::from_slice(&fetched.body)
            .map_err(|e| RequestError::Malformed(format!("invalid JSON body: {e}")))
    }

    /// Runs the scheduled fetch, with at most one credential refresh and
    /// replay on an authentication challenge.
    async fn fetch_network(
        &self,
        mut target: Target,
        options: &FetchOptions,
        cache_key: Option<&str>,
    ) -> Result<Response, RequestError> {
        if let Some(provider) = &self.credentials {
            let token = provider.token().await?;
            target.set_header("Authorization", format!("Bearer {token}"));
        }

        let spec = self.build_spec(target.clone(), options, cache_key);
        match (self.scheduler.submit(spec).await, &self.credentials) {
            (Ok(response), _) => Ok(response),
            (Err(error), Some(provider)) if error.is_auth_challenge() => {
                debug!("Authentication challenge, refreshing credentials");
                let token = provider.refresh().await?;
                target.set_header("Authorization", format!("Bearer {token}"));
                let replay = self.build_spec(target, options, cache_key);
                self.scheduler.submit(replay).await
            }
            (Err(error), _) => Err(error),
        }
    }

    fn build_spec(
        &self,
        target: Target,
        options: &FetchOptions,
        cache_key: Option<&str>,
    ) -> RequestSpec {
        let mut spec = RequestSpec::new(target);
        if let Some(priority) = options.priority {
            spec = spec.with_priority(priority);
        }
        if let Some(key) = cache_key {
            spec = spec.with_cache_key(key);
        }
        if let Some(ttl) = options.ttl {
            spec = spec.with_cache_ttl(ttl);
        }
        if let Some(timeout) = options.timeout {
            spec = spec.with_timeout(timeout);
        }
        spec
    }

    /// Health report for one endpoint (host + path), if it has samples.
    pub fn health(&self, endpoint: &str) -> Option<HealthReport> {
        self.health.health(endpoint)
    }

    /// Aggregated statistics for every tracked endpoint.
    pub fn all_stats(&self) -> HashMap<String, EndpointStats> {
        self.health.all_stats()
    }

    /// Scheduler counter snapshot.
    pub fn scheduler_stats(&self) -> SchedulerStatsSnapshot {
        self.scheduler.stats()
    }

    /// Cache hit/miss counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Subscribes to scheduler lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.scheduler.subscribe()
    }

    /// Stops the scheduler and the cache sweeper. Pending requests are
    /// rejected with [`RequestError::Shutdown`].
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.scheduler.shutdown();
    }
}
