//! # WalletCache Abstraction
//!
//! Best-effort key/value cache for wallet snapshots. The cache is an
//! accelerator only: every caller treats a [`CacheError`] as a miss (reads) or
//! logs it and moves on (writes and invalidations).
//!
//! ## Implementations
//!
//! - **RedisWalletCache**: production implementation on Redis
//! - **InMemoryWalletCache**: dev/test implementation on a concurrent map

use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

/// Errors raised by cache backends
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Key/value store for serialized wallet snapshots
#[async_trait]
pub trait WalletCache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    async fn set(&self, key: &str, value: String) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;
}

impl fmt::Debug for dyn WalletCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletCache")
    }
}

/// WalletCache implementation on a process-local [`DashMap`]
#[derive(Clone, Default)]
pub struct InMemoryWalletCache {
    entries: Arc<DashMap<String, String>>,
}

impl InMemoryWalletCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

#[async_trait]
impl WalletCache for InMemoryWalletCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> CacheResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}
