//! Repository for wallet reads and balance writes
//!
//! Bridges the durable [`WalletStore`] and the optional [`WalletCache`]:
//! - reads are cache-aside (cache first, store on miss, then populate)
//! - writes run on a caller-owned [`WalletTransaction`]
//! - a committed write invalidates the wallet's cache entry; an uncommitted
//!   one never touches the cache
//!
//! Cache failures are logged and never fail an operation. The store is the
//! source of truth.
//!
//! Each wallet carries an invalidation generation. A read that missed the
//! cache only keeps the snapshot it populated if no invalidation ran between
//! its store read and its cache write, so a snapshot taken before a commit
//! cannot outlive that commit's invalidation.

use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;

use super::wallet_cache::WalletCache;
use super::wallet_store::{StoreError, WalletStore, WalletTx};
use crate::models::{Wallet, WalletId};

/// Errors that can occur during wallet repository operations
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("wallet {0} not found")]
    WalletNotFound(WalletId),

    #[error("concurrent update on wallet {wallet_id}: {reason}")]
    Conflict { wallet_id: WalletId, reason: String },

    #[error("{operation} failed for wallet {wallet_id}: {source}")]
    Store {
        operation: &'static str,
        wallet_id: WalletId,
        #[source]
        source: StoreError,
    },
}

impl RepoError {
    fn from_store(operation: &'static str, wallet_id: WalletId, err: StoreError) -> Self {
        match err {
            StoreError::Conflict(reason) => RepoError::Conflict { wallet_id, reason },
            source => RepoError::Store {
                operation,
                wallet_id,
                source,
            },
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// A store transaction handed out by [`WalletRepository::begin`]
///
/// Tracks which wallets it wrote so their cache entries can be invalidated
/// once, and only once, the transaction commits.
pub struct WalletTransaction {
    inner: Box<dyn WalletTx>,
    wallet_id: WalletId,
    written: Vec<WalletId>,
}

impl WalletTransaction {
    /// Wallet this transaction was opened for
    pub fn wallet_id(&self) -> WalletId {
        self.wallet_id
    }
}

/// Wallet repository over a store and an optional cache
#[derive(Clone)]
pub struct WalletRepository {
    store: Arc<dyn WalletStore>,
    cache: Option<Arc<dyn WalletCache>>,
    generations: Arc<DashMap<WalletId, u64>>,
}

impl WalletRepository {
    pub fn new(store: Arc<dyn WalletStore>, cache: Option<Arc<dyn WalletCache>>) -> Self {
        Self {
            store,
            cache,
            generations: Arc::new(DashMap::new()),
        }
    }

    /// Repository with no cache; every read goes to the store
    pub fn without_cache(store: Arc<dyn WalletStore>) -> Self {
        Self::new(store, None)
    }

    /// Cache-aside read of a wallet
    ///
    /// Returns the cached snapshot when present and decodable. Otherwise reads
    /// the store by primary key and, on success, populates the cache.
    pub async fn get_wallet(&self, id: WalletId) -> RepoResult<Wallet> {
        let key = id.cache_key();

        if let Some(cache) = &self.cache {
            match cache.get(&key).await {
                Ok(Some(raw)) => match serde_json::from_str::<Wallet>(&raw) {
                    Ok(wallet) if wallet.id == id => {
                        tracing::debug!(wallet_id = %id, "Wallet cache hit");
                        return Ok(wallet);
                    }
                    Ok(_) => {
                        tracing::warn!(wallet_id = %id, "Cached snapshot has mismatched id, ignoring");
                    }
                    Err(e) => {
                        tracing::warn!(wallet_id = %id, error = %e, "Undecodable cached snapshot, ignoring");
                    }
                },
                Ok(None) => {
                    tracing::debug!(wallet_id = %id, "Wallet cache miss");
                }
                Err(e) => {
                    tracing::warn!(wallet_id = %id, error = %e, "Cache read failed, falling back to store");
                }
            }
        }

        // Read before the store so a concurrent invalidation is always observed
        let generation = self.generation(id);

        let wallet = self
            .store
            .find_wallet(id)
            .await
            .map_err(|e| RepoError::from_store("find_wallet", id, e))?
            .ok_or(RepoError::WalletNotFound(id))?;

        self.populate(&key, &wallet, generation).await;

        Ok(wallet)
    }

    /// Begin a store transaction scoped to one wallet mutation
    pub async fn begin(&self, wallet_id: WalletId) -> RepoResult<WalletTransaction> {
        let inner = self
            .store
            .begin()
            .await
            .map_err(|e| RepoError::from_store("begin", wallet_id, e))?;

        Ok(WalletTransaction {
            inner,
            wallet_id,
            written: Vec::new(),
        })
    }

    /// Read a wallet row and hold its lock until the transaction ends
    pub async fn lock_wallet(
        &self,
        tx: &mut WalletTransaction,
        id: WalletId,
    ) -> RepoResult<Wallet> {
        tx.inner
            .lock_wallet(id)
            .await
            .map_err(|e| RepoError::from_store("lock_wallet", id, e))?
            .ok_or(RepoError::WalletNotFound(id))
    }

    /// Write a new balance for `id` inside the caller's transaction
    ///
    /// The cache entry for `id` is invalidated when the transaction is
    /// committed through [`WalletRepository::commit`].
    pub async fn update_wallet(
        &self,
        tx: &mut WalletTransaction,
        id: WalletId,
        balance: Decimal,
    ) -> RepoResult<()> {
        let rows = tx
            .inner
            .update_balance(id, balance)
            .await
            .map_err(|e| RepoError::from_store("update_wallet", id, e))?;

        if rows == 0 {
            return Err(RepoError::WalletNotFound(id));
        }

        if !tx.written.contains(&id) {
            tx.written.push(id);
        }

        tracing::debug!(wallet_id = %id, balance = %balance, "Staged wallet balance update");

        Ok(())
    }

    /// Commit the transaction, then invalidate the cache entry of every wallet
    /// it wrote
    ///
    /// Commit and invalidation run on their own task. Dropping the returned
    /// future (a client disconnect, a caller-side timeout) does not stop the
    /// invalidation of a commit that already landed.
    pub async fn commit(&self, tx: WalletTransaction) -> RepoResult<()> {
        let WalletTransaction {
            inner,
            wallet_id,
            written,
        } = tx;

        let repo = self.clone();
        let handle = tokio::spawn(async move {
            inner
                .commit()
                .await
                .map_err(|e| RepoError::from_store("commit", wallet_id, e))?;

            for id in written {
                repo.invalidate(id).await;
            }

            Ok(())
        });

        match handle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(RepoError::Store {
                operation: "commit",
                wallet_id,
                source: StoreError::Interrupted(e.to_string()),
            }),
        }
    }

    /// Roll the transaction back; the cache is left untouched
    pub async fn rollback(&self, tx: WalletTransaction) -> RepoResult<()> {
        let wallet_id = tx.wallet_id;
        tx.inner
            .rollback()
            .await
            .map_err(|e| RepoError::from_store("rollback", wallet_id, e))
    }

    /// Provision a wallet row (seeding only; not part of the ledger API)
    pub async fn insert_wallet(&self, wallet: &Wallet) -> RepoResult<()> {
        self.store
            .insert_wallet(wallet)
            .await
            .map_err(|e| RepoError::from_store("insert_wallet", wallet.id, e))
    }

    fn generation(&self, id: WalletId) -> u64 {
        self.generations.get(&id).map(|g| *g).unwrap_or(0)
    }

    async fn populate(&self, key: &str, wallet: &Wallet, generation: u64) {
        let Some(cache) = &self.cache else {
            return;
        };

        if self.generation(wallet.id) != generation {
            tracing::debug!(wallet_id = %wallet.id, "Wallet invalidated during read, not caching snapshot");
            return;
        }

        let raw = match serde_json::to_string(wallet) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(wallet_id = %wallet.id, error = %e, "Failed to serialize wallet snapshot");
                return;
            }
        };

        if let Err(e) = cache.set(key, raw).await {
            tracing::warn!(wallet_id = %wallet.id, error = %e, "Failed to populate wallet cache");
            return;
        }

        // An invalidation that bumped the generation while our set was in
        // flight may have deleted before the set landed
        if self.generation(wallet.id) != generation {
            tracing::debug!(wallet_id = %wallet.id, "Wallet invalidated during populate, dropping snapshot");
            if let Err(e) = cache.delete(key).await {
                tracing::warn!(wallet_id = %wallet.id, error = %e, "Failed to drop superseded wallet snapshot");
            }
        }
    }

    async fn invalidate(&self, id: WalletId) {
        let Some(cache) = &self.cache else {
            return;
        };

        // Bump before the delete; populate re-checks after its set
        *self.generations.entry(id).or_insert(0) += 1;

        match cache.delete(&id.cache_key()).await {
            Ok(()) => tracing::debug!(wallet_id = %id, "Invalidated wallet cache entry"),
            Err(e) => tracing::error!(
                wallet_id = %id,
                error = %e,
                "Failed to invalidate wallet cache entry, cached reads may be stale"
            ),
        }
    }
}
