//! End-to-end facade behavior: cache-first reads, stale fallback,
//! credential replay, and JSON decoding.

use bytes::Bytes;
use ordergate::auth::{CredentialProvider, StaticToken};
use ordergate::cache::MemoryStorage;
use ordergate::client::{FetchOptions, OrchestratingClient};
use ordergate::config::{CacheConfig, ClientConfig, RetryConfig};
use ordergate::error::{AuthError, RequestError, TransportError};
use ordergate::transport::{Response, Target, Transport};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn ok_response(body: &'static [u8]) -> Response {
    Response {
        status: 200,
        headers: Vec::new(),
        body: Bytes::from_static(body),
    }
}

fn status_response(status: u16) -> Response {
    Response {
        status,
        headers: Vec::new(),
        body: Bytes::new(),
    }
}

/// Replays a scripted outcome sequence, recording each request's
/// Authorization header.
struct ScriptedTransport {
    script: Mutex<Vec<Result<Response, TransportError>>>,
    auth_headers: Mutex<Vec<Option<String>>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Result<Response, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script),
            auth_headers: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.auth_headers.lock().unwrap().len()
    }

    fn auth_headers(&self) -> Vec<Option<String>> {
        self.auth_headers.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, target: &Target) -> Result<Response, TransportError> {
        let auth = target
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
            .map(|(_, value)| value.clone());
        self.auth_headers.lock().unwrap().push(auth);
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return Err(TransportError::Connect("script exhausted".to_string()));
        }
        script.remove(0)
    }
}

/// Serves a rotating token list; each refresh advances to the next.
struct RotatingProvider {
    tokens: Mutex<Vec<String>>,
    refreshes: AtomicUsize,
}

impl RotatingProvider {
    fn new(tokens: &[&str]) -> Self {
        Self {
            tokens: Mutex::new(tokens.iter().map(|t| t.to_string()).collect()),
            refreshes: AtomicUsize::new(0),
        }
    }
}

impl CredentialProvider for RotatingProvider {
    async fn token(&self) -> Result<String, AuthError> {
        self.tokens
            .lock()
            .unwrap()
            .first()
            .cloned()
            .ok_or_else(|| AuthError::Missing("token list empty".to_string()))
    }

    async fn refresh(&self) -> Result<String, AuthError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let mut tokens = self.tokens.lock().unwrap();
        if tokens.len() > 1 {
            tokens.remove(0);
        }
        tokens
            .first()
            .cloned()
            .ok_or_else(|| AuthError::Refresh("token list empty".to_string()))
    }
}

fn fast_config() -> ClientConfig {
    ClientConfig::new().with_retry(
        RetryConfig::new()
            .with_max_attempts(2)
            .with_initial_delay(Duration::from_millis(5))
            .with_max_delay(Duration::from_millis(20)),
    )
}

/// Waits for the spawned cache write-through to land.
async fn wait_for_writes<S, C>(client: &OrchestratingClient<S, C>, writes: u64)
where
    S: ordergate::cache::Storage + 'static,
    C: CredentialProvider,
{
    for _ in 0..200 {
        if client.cache_stats().writes >= writes {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("cache write-through never landed");
}

async fn client_without_credentials(
    transport: Arc<ScriptedTransport>,
    config: ClientConfig,
) -> OrchestratingClient<MemoryStorage, StaticToken> {
    OrchestratingClient::new(config, transport, MemoryStorage::new(), None).await
}

#[tokio::test]
async fn test_second_fetch_serves_from_cache() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(ok_response(b"payload"))]));
    let client = client_without_credentials(Arc::clone(&transport), fast_config()).await;

    let first = client
        .fetch(Target::get("https://api.test/orders"), FetchOptions::new())
        .await
        .unwrap();
    assert!(!first.from_cache);
    assert_eq!(first.body, Bytes::from_static(b"payload"));
    wait_for_writes(&client, 1).await;

    let second = client
        .fetch(Target::get("https://api.test/orders"), FetchOptions::new())
        .await
        .unwrap();
    assert!(second.from_cache);
    assert!(!second.stale);
    assert_eq!(second.body, Bytes::from_static(b"payload"));

    // The network was touched exactly once.
    assert_eq!(transport.calls(), 1);
    assert_eq!(client.cache_stats().hits, 1);
}

#[tokio::test]
async fn test_force_refresh_bypasses_cache_read() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(ok_response(b"v1")),
        Ok(ok_response(b"v2")),
    ]));
    let client = client_without_credentials(Arc::clone(&transport), fast_config()).await;

    let first = client
        .fetch(Target::get("https://api.test/orders"), FetchOptions::new())
        .await
        .unwrap();
    assert_eq!(first.body, Bytes::from_static(b"v1"));
    wait_for_writes(&client, 1).await;

    let refreshed = client
        .fetch(
            Target::get("https://api.test/orders"),
            FetchOptions::new().force_refresh(),
        )
        .await
        .unwrap();
    assert!(!refreshed.from_cache);
    assert_eq!(refreshed.body, Bytes::from_static(b"v2"));
    assert_eq!(transport.calls(), 2);
    wait_for_writes(&client, 2).await;

    // The refresh wrote through: a third plain fetch sees v2.
    let third = client
        .fetch(Target::get("https://api.test/orders"), FetchOptions::new())
        .await
        .unwrap();
    assert!(third.from_cache);
    assert_eq!(third.body, Bytes::from_static(b"v2"));
}

#[tokio::test]
async fn test_stale_entry_served_when_retries_exhaust() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(ok_response(b"cached")),
        Ok(status_response(503)),
        Ok(status_response(503)),
    ]));
    let config = fast_config().with_cache(
        CacheConfig::new()
            .with_default_ttl(Duration::from_millis(50))
            .with_stale_grace_multiplier(10),
    );
    let client = client_without_credentials(Arc::clone(&transport), config).await;

    let fresh = client
        .fetch(Target::get("https://api.test/orders"), FetchOptions::new())
        .await
        .unwrap();
    assert!(!fresh.from_cache);
    wait_for_writes(&client, 1).await;

    // Entry goes stale but stays inside the grace window.
    tokio::time::sleep(Duration::from_millis(80)).await;

    let fallback = client
        .fetch(Target::get("https://api.test/orders"), FetchOptions::new())
        .await
        .unwrap();
    assert!(fallback.from_cache);
    assert!(fallback.stale);
    assert_eq!(fallback.body, Bytes::from_static(b"cached"));
    // Both attempts of the failed fetch hit the network.
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn test_exhaustion_without_stale_entry_surfaces_error() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(status_response(500)),
        Ok(status_response(500)),
    ]));
    let client = client_without_credentials(Arc::clone(&transport), fast_config()).await;

    let error = client
        .fetch(Target::get("https://api.test/orders"), FetchOptions::new())
        .await
        .unwrap_err();
    match error {
        RequestError::Exhausted { attempts, last } => {
            assert_eq!(attempts, 2);
            assert_eq!(last.status(), Some(500));
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_auth_challenge_refreshes_and_replays_once() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(status_response(401)),
        Ok(ok_response(b"secured")),
    ]));
    let provider = Arc::new(RotatingProvider::new(&["stale-token", "fresh-token"]));
    let client: OrchestratingClient<MemoryStorage, RotatingProvider> = OrchestratingClient::new(
        fast_config(),
        Arc::clone(&transport),
        MemoryStorage::new(),
        Some(Arc::clone(&provider)),
    )
    .await;

    let fetched = client
        .fetch(Target::get("https://api.test/private"), FetchOptions::new())
        .await
        .unwrap();
    assert_eq!(fetched.body, Bytes::from_static(b"secured"));

    assert_eq!(provider.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(
        transport.auth_headers(),
        vec![
            Some("Bearer stale-token".to_string()),
            Some("Bearer fresh-token".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_second_auth_challenge_is_terminal() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(status_response(401)),
        Ok(status_response(401)),
    ]));
    let provider = Arc::new(RotatingProvider::new(&["t1", "t2"]));
    let client: OrchestratingClient<MemoryStorage, RotatingProvider> = OrchestratingClient::new(
        fast_config(),
        Arc::clone(&transport),
        MemoryStorage::new(),
        Some(Arc::clone(&provider)),
    )
    .await;

    let error = client
        .fetch(Target::get("https://api.test/private"), FetchOptions::new())
        .await
        .unwrap_err();
    assert!(error.is_auth_challenge());
    // Exactly one refresh, exactly two network calls.
    assert_eq!(provider.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_auth_challenge_without_credentials_is_terminal() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(status_response(401))]));
    let client = client_without_credentials(Arc::clone(&transport), fast_config()).await;

    let error = client
        .fetch(Target::get("https://api.test/private"), FetchOptions::new())
        .await
        .unwrap_err();
    assert_eq!(error.status(), Some(401));
    assert_eq!(transport.calls(), 1);
}

#[derive(Debug, Deserialize, PartialEq)]
struct Order {
    id: u64,
    item: String,
}

#[tokio::test]
async fn test_fetch_json_decodes_body() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(ok_response(
        br#"{"id":42,"item":"widget"}"#,
    ))]));
    let client = client_without_credentials(Arc::clone(&transport), fast_config()).await;

    let order: Order = client
        .fetch_json(Target::get("https://api.test/orders/42"), FetchOptions::new())
        .await
        .unwrap();
    assert_eq!(
        order,
        Order {
            id: 42,
            item: "widget".to_string()
        }
    );
}

#[tokio::test]
async fn test_fetch_json_rejects_invalid_body() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(ok_response(b"not json"))]));
    let client = client_without_credentials(Arc::clone(&transport), fast_config()).await;

    let error = client
        .fetch_json::<Order>(Target::get("https://api.test/orders/9"), FetchOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(error, RequestError::Malformed(_)));
}

#[tokio::test]
async fn test_health_visible_through_facade() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(ok_response(b"ok"))]));
    let client = client_without_credentials(Arc::clone(&transport), fast_config()).await;

    client
        .fetch(Target::get("https://api.test/orders"), FetchOptions::new())
        .await
        .unwrap();

    let report = client.health("api.test/orders").unwrap();
    assert!(report.healthy);
    assert_eq!(report.stats.sample_count, 1);
    assert!(client.all_stats().contains_key("api.test/orders"));
    assert_eq!(client.scheduler_stats().resolved, 1);
}

#[tokio::test]
async fn test_shutdown_stops_the_pipeline() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(ok_response(b"ok"))]));
    let client = client_without_credentials(Arc::clone(&transport), fast_config()).await;

    client.shutdown();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let error = client
        .fetch(Target::get("https://api.test/orders"), FetchOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(error, RequestError::Shutdown));
}
