// Redis-backed wallet snapshot cache

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::future::Future;
use std::time::Duration;

use super::wallet_cache::{CacheError, CacheResult, WalletCache};

/// WalletCache implementation on Redis
///
/// Every command is wrapped in a timeout so a slow or partitioned Redis
/// degrades to cache misses instead of stalling the request.
#[derive(Clone)]
pub struct RedisWalletCache {
    connection_manager: ConnectionManager,
    op_timeout: Duration,
    ttl: Option<Duration>,
}

impl RedisWalletCache {
    /// Connect to Redis and verify the connection with PING
    pub async fn connect(
        redis_url: &str,
        op_timeout: Duration,
        ttl: Option<Duration>,
    ) -> CacheResult<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            CacheError::Unavailable(format!("invalid Redis URL '{}': {}", redis_url, e))
        })?;

        let connection_manager = tokio::time::timeout(
            Duration::from_secs(10),
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| CacheError::Timeout(Duration::from_secs(10)))?
        .map_err(|e| CacheError::Unavailable(format!("failed to connect to Redis: {}", e)))?;

        let cache = Self {
            connection_manager,
            op_timeout,
            ttl,
        };
        cache.ping().await?;
        Ok(cache)
    }

    pub async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();
        let reply: String = self
            .bounded(async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;

        if reply == "PONG" {
            Ok(())
        } else {
            Err(CacheError::Unavailable(format!(
                "unexpected PING reply: {}",
                reply
            )))
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> CacheResult<T>
    where
        F: Future<Output = redis::RedisResult<T>> + Send,
    {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| CacheError::Timeout(self.op_timeout))?
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl WalletCache for RedisWalletCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection_manager.clone();
        self.bounded(async move { conn.get::<_, Option<String>>(key).await })
            .await
    }

    async fn set(&self, key: &str, value: String) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();
        match self.ttl {
            Some(ttl) => {
                let secs = ttl.as_secs().max(1);
                self.bounded(async move { conn.set_ex::<_, _, ()>(key, value, secs).await })
                    .await
            }
            None => {
                self.bounded(async move { conn.set::<_, _, ()>(key, value).await })
                    .await
            }
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();
        self.bounded(async move { conn.del::<_, ()>(key).await })
            .await
    }
}
