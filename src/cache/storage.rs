//! Persistent key-value storage capability.
//!
//! The cache does not care whether durability is backed by disk, browser
//! storage, or memory; it consumes this narrow trait. The abstraction also
//! allows fault-injecting mocks in tests.

use crate::error::StorageError;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

/// Injected persistent key-value capability consumed by the cache.
pub trait Storage: Send + Sync {
    /// Reads the raw bytes stored under `key`, if any.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, StorageError>> + Send;

    /// Stores `value` under `key`, overwriting any previous value.
    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Removes the value stored under `key`. Removing a missing key is not
    /// an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Lists all stored keys, for hydration at startup.
    fn list(&self) -> impl Future<Output = Result<Vec<String>, StorageError>> + Send;
}

impl<S: Storage> Storage for &S {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        (**self).set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        (**self).delete(key).await
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        (**self).list().await
    }
}

impl<S: Storage> Storage for std::sync::Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        (**self).set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        (**self).delete(key).await
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        (**self).list().await
    }
}

/// In-memory [`Storage`] implementation.
///
/// Provides no durability across restarts; useful for tests and for hosts
/// without persistent storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let map = self
            .inner
            .lock()
            .map_err(|e| StorageError::Read(e.to_string()))?;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|e| StorageError::Write(e.to_string()))?;
        map.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|e| StorageError::Delete(e.to_string()))?;
        map.remove(key);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let map = self
            .inner
            .lock()
            .map_err(|e| StorageError::List(e.to_string()))?;
        Ok(map.keys().cloned().collect())
    }
}
