//! Ordergate - request orchestration for a remote order-management API
//!
//! This library turns an unreliable, rate-limited remote API into a
//! predictable, boundedly-concurrent, cache-aware request pipeline that
//! degrades gracefully under failure.
//!
//! # High-Level API
//!
//! For most use cases, the [`client`] module provides the facade:
//!
//! ```ignore
//! use std::sync::Arc;
//! use ordergate::auth::StaticToken;
//! use ordergate::cache::MemoryStorage;
//! use ordergate::client::{FetchOptions, OrchestratingClient};
//! use ordergate::config::ClientConfig;
//! use ordergate::transport::{ReqwestTransport, Target};
//!
//! let transport = Arc::new(ReqwestTransport::new()?);
//! let credentials = Arc::new(StaticToken::new("api-token"));
//! let client = OrchestratingClient::new(
//!     ClientConfig::new(),
//!     transport,
//!     MemoryStorage::new(),
//!     Some(credentials),
//! )
//! .await;
//!
//! let fetched = client
//!     .fetch(
//!         Target::get("https://api.example.com/orders"),
//!         FetchOptions::new().with_cache_key("orders"),
//!     )
//!     .await?;
//! ```

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod ratelimit;
pub mod retry;
pub mod scheduler;
pub mod transport;

/// Version of the ordergate library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
