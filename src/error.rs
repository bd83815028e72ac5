//! Error types for the request orchestration pipeline.
//!
//! Errors are split between the user-visible [`RequestError`] taxonomy
//! returned by the facade and scheduler, and narrow seam errors
//! ([`TransportError`], [`StorageError`], [`AuthError`]) produced by the
//! injected collaborator capabilities.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to callers of the orchestration pipeline.
///
/// A terminal failure after retries is always wrapped in
/// [`RequestError::Exhausted`] so the caller sees the attempt count along
/// with the last underlying cause, never a raw transport exception.
#[derive(Debug, Error, Clone)]
pub enum RequestError {
    /// Transport-level failure (connection refused, DNS failure, reset).
    #[error("network error: {0}")]
    Network(String),

    /// Per-attempt deadline exceeded; the in-flight call was aborted.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-2xx HTTP response from the server.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// No rate window available. Handled internally by re-queuing; callers
    /// only ever see this if they bypass the scheduler.
    #[error("rate limit window exhausted")]
    RateLimited,

    /// Token refresh failed while handling a 401 challenge.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Cache storage read/write failure. Never fatal to the request path.
    #[error("cache error: {0}")]
    Cache(String),

    /// The pending queue is full; the submission was rejected.
    #[error("scheduler queue full (limit {limit})")]
    CapacityExceeded { limit: usize },

    /// The scheduler was shut down before the ticket completed.
    #[error("scheduler shut down")]
    Shutdown,

    /// The response body could not be decoded into the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// All retry attempts were exhausted. Carries the terminal cause.
    #[error("request failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<RequestError>,
    },
}

impl RequestError {
    /// Returns the HTTP status code if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Exhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Returns true if this is a 401 challenge eligible for the facade's
    /// one-shot token-refresh-and-replay.
    pub fn is_auth_challenge(&self) -> bool {
        self.status() == Some(401)
    }

    /// Returns true when the generic backoff loop may retry this error.
    ///
    /// Retryable: network failures, timeouts, HTTP 5xx, HTTP 429.
    /// Everything else is assumed permanent; 401 is special-cased by the
    /// facade, outside the generic retry budget.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Errors from the network transport capability.
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    /// The request never produced a response (DNS, connect, reset).
    #[error("request failed: {0}")]
    Connect(String),

    /// The response arrived but its body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),
}

impl From<TransportError> for RequestError {
    fn from(err: TransportError) -> Self {
        RequestError::Network(err.to_string())
    }
}

/// Errors from the injected persistent key-value capability.
#[derive(Debug, Error, Clone)]
pub enum StorageError {
    #[error("storage read failed: {0}")]
    Read(String),

    #[error("storage write failed: {0}")]
    Write(String),

    #[error("storage delete failed: {0}")]
    Delete(String),

    #[error("storage list failed: {0}")]
    List(String),
}

/// Errors from the credential provider capability.
#[derive(Debug, Error, Clone)]
pub enum AuthError {
    /// No credential is available and none can be obtained.
    #[error("no credential available: {0}")]
    Missing(String),

    /// The refresh call itself failed.
    #[error("token refresh failed: {0}")]
    Refresh(String),
}

impl From<AuthError> for RequestError {
    fn from(err: AuthError) -> Self {
        RequestError::Authentication(err.to_string())
    }
}
