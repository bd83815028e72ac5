//! Credential provider capability.
//!
//! The facade attaches a bearer token to every outbound request and, on an
//! HTTP 401, performs a one-shot refresh-and-replay through this trait.

use crate::error::AuthError;
use std::future::Future;
use std::sync::Mutex;

/// Injected credential source consumed by the facade.
pub trait CredentialProvider: Send + Sync {
    /// Returns the current token.
    fn token(&self) -> impl Future<Output = Result<String, AuthError>> + Send;

    /// Obtains a new token, invalidating the old one. Called exactly once
    /// per 401 challenge.
    fn refresh(&self) -> impl Future<Output = Result<String, AuthError>> + Send;
}

/// A fixed token that cannot be refreshed.
///
/// Suitable for API keys; a 401 with this provider surfaces as an
/// authentication error immediately.
#[derive(Debug)]
pub struct StaticToken {
    token: Mutex<String>,
}

impl StaticToken {
    /// Creates a provider that always serves `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(token.into()),
        }
    }
}

impl CredentialProvider for StaticToken {
    async fn token(&self) -> Result<String, AuthError> {
        Ok(self.token.lock().unwrap().clone())
    }

    async fn refresh(&self) -> Result<String, AuthError> {
        Err(AuthError::Refresh(
            "static token cannot be refreshed".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_serves_value() {
        let provider = StaticToken::new("secret");
        assert_eq!(provider.token().await.unwrap(), "secret");
    }

    #[tokio::test]
    async fn test_static_token_refresh_fails() {
        let provider = StaticToken::new("secret");
        assert!(matches!(
            provider.refresh().await,
            Err(AuthError::Refresh(_))
        ));
    }
}
