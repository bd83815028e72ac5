//! Network transport abstraction.
//!
//! The scheduler issues attempts through the narrow [`Transport`] trait,
//! which allows mock transports in tests and keeps protocol-level concerns
//! (connection pooling, TLS, HTTP versions) delegated to the platform
//! client. [`ReqwestTransport`] is the production implementation.
//!
//! A transport returns a [`Response`] for *any* HTTP status; only failures
//! to produce a response at all (DNS, connect, reset, body read) are
//! errors. Status classification is the scheduler's job.

use crate::error::TransportError;
use bytes::Bytes;
use std::future::Future;
use tracing::{trace, warn};

/// HTTP method of a request target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Canonical uppercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to issue one network call.
#[derive(Debug, Clone)]
pub struct Target {
    /// HTTP method.
    pub method: Method,
    /// Absolute request URL.
    pub url: String,
    /// Header name/value pairs sent with the request.
    pub headers: Vec<(String, String)>,
    /// Optional request body.
    pub body: Option<Bytes>,
}

impl Target {
    /// Creates a GET target with no headers or body.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Sets a header, replacing any existing header with the same name
    /// (case-insensitive). Used for credential replacement on replay.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        for (existing, existing_value) in &mut self.headers {
            if existing.eq_ignore_ascii_case(name) {
                *existing_value = value;
                return;
            }
        }
        self.headers.push((name.to_string(), value));
    }

    /// Logical endpoint for health tracking: host plus path, no scheme,
    /// query, or fragment.
    pub fn endpoint(&self) -> String {
        let after_scheme = match self.url.find("://") {
            Some(idx) => &self.url[idx + 3..],
            None => self.url.as_str(),
        };
        let end = after_scheme
            .find(['?', '#'])
            .unwrap_or(after_scheme.len());
        after_scheme[..end].to_string()
    }
}

/// Response produced by the transport.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Raw response body.
    pub body: Bytes,
}

impl Response {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Narrow network capability consumed by the scheduler.
pub trait Transport: Send + Sync {
    /// Issues one network call.
    ///
    /// The per-attempt deadline is enforced by the caller (dropping the
    /// future aborts the call); implementations should not impose a
    /// shorter timeout of their own.
    fn send(&self, target: &Target) -> impl Future<Output = Result<Response, TransportError>> + Send;
}

/// Production transport backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with connection pooling tuned for a small
    /// number of concurrent calls to one API host.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| TransportError::Connect(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, target: &Target) -> Result<Response, TransportError> {
        trace!(method = %target.method, url = %target.url, "Issuing request");

        let method = match target.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut request = self.client.request(method, &target.url);
        for (name, value) in &target.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &target.body {
            request = request.body(body.clone());
        }

        let response = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(
                    url = %target.url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "Request failed"
                );
                return Err(TransportError::Connect(e.to_string()));
            }
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        trace!(url = %target.url, status, bytes = body.len(), "Response received");

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_display() {
        assert_eq!(format!("{}", Method::Get), "GET");
        assert_eq!(format!("{}", Method::Delete), "DELETE");
    }

    #[test]
    fn test_endpoint_strips_scheme_and_query() {
        let target = Target::get("https://api.example.com/v1/orders?page=2#top");
        assert_eq!(target.endpoint(), "api.example.com/v1/orders");

        let target = Target::get("api.example.com/v1/orders");
        assert_eq!(target.endpoint(), "api.example.com/v1/orders");
    }

    #[test]
    fn test_set_header_replaces_case_insensitive() {
        let mut target = Target::get("https://api.example.com/orders");
        target.set_header("Authorization", "Bearer old");
        target.set_header("authorization", "Bearer new");

        assert_eq!(target.headers.len(), 1);
        assert_eq!(target.headers[0].1, "Bearer new");
    }

    #[test]
    fn test_response_success_range() {
        let resp = |status| Response {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        };
        assert!(resp(200).is_success());
        assert!(resp(204).is_success());
        assert!(!resp(301).is_success());
        assert!(!resp(404).is_success());
        assert!(!resp(500).is_success());
    }

    /// Scripted transport used by unit tests elsewhere in the crate.
    pub(crate) struct ScriptedTransport {
        responses: std::sync::Mutex<Vec<Result<Response, TransportError>>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(responses: Vec<Result<Response, TransportError>>) -> Self {
            Self {
                responses: std::sync::Mutex::new(responses),
            }
        }
    }

    impl Transport for ScriptedTransport {
        async fn send(&self, _target: &Target) -> Result<Response, TransportError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(TransportError::Connect("script exhausted".to_string()));
            }
            responses.remove(0)
        }
    }

    #[tokio::test]
    async fn test_scripted_transport_plays_in_order() {
        let transport = ScriptedTransport::new(vec![
            Ok(Response {
                status: 500,
                headers: Vec::new(),
                body: Bytes::new(),
            }),
            Ok(Response {
                status: 200,
                headers: Vec::new(),
                body: Bytes::from_static(b"ok"),
            }),
        ]);

        let target = Target::get("https://api.example.com/orders");
        assert_eq!(transport.send(&target).await.unwrap().status, 500);
        assert_eq!(transport.send(&target).await.unwrap().status, 200);
        assert!(transport.send(&target).await.is_err());
    }
}
