//! In-memory implementation of the WalletStore trait for testing and development

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::wallet_store::{StoreError, StoreResult, WalletStore, WalletTx};
use crate::models::{Wallet, WalletId, BALANCE_SCALE};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// One wallet row: the committed snapshot plus the row lock writers queue on
struct WalletRow {
    lock: Arc<Mutex<()>>,
    committed: RwLock<Wallet>,
}

/// WalletStore implementation backed by a process-local map
///
/// Mirrors the Postgres behaviour the ledger relies on:
/// - plain reads see the last committed snapshot and never block on writers
/// - `lock_wallet` holds a per-row lock until commit/rollback/drop
/// - staged balances become visible only on commit
/// - a negative balance is rejected like the `CHECK (balance >= 0)` constraint
///
/// # Example
/// ```rust
/// use wallet_rs::models::{Wallet, WalletId};
/// use wallet_rs::repos::{InMemoryWalletStore, WalletStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryWalletStore::new();
/// store.insert_wallet(&Wallet::new(WalletId(1), "user1", 100.into())).await?;
///
/// let mut tx = store.begin().await?;
/// tx.lock_wallet(WalletId(1)).await?;
/// tx.update_balance(WalletId(1), 150.into()).await?;
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryWalletStore {
    rows: Arc<RwLock<HashMap<WalletId, Arc<WalletRow>>>>,
    lock_timeout: Duration,
}

impl InMemoryWalletStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Create a store whose row-lock waits give up after `lock_timeout`
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
            lock_timeout,
        }
    }

    async fn row(&self, id: WalletId) -> Option<Arc<WalletRow>> {
        self.rows.read().await.get(&id).cloned()
    }
}

impl Default for InMemoryWalletStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn find_wallet(&self, id: WalletId) -> StoreResult<Option<Wallet>> {
        match self.row(id).await {
            Some(row) => Ok(Some(row.committed.read().await.clone())),
            None => Ok(None),
        }
    }

    async fn begin(&self) -> StoreResult<Box<dyn WalletTx>> {
        Ok(Box::new(InMemoryWalletTx {
            rows: self.rows.clone(),
            lock_timeout: self.lock_timeout,
            held: HashMap::new(),
        }))
    }

    async fn insert_wallet(&self, wallet: &Wallet) -> StoreResult<()> {
        if wallet.balance < Decimal::ZERO {
            return Err(StoreError::ConstraintViolation(format!(
                "wallet {} balance must be non-negative",
                wallet.id
            )));
        }

        let mut rows = self.rows.write().await;
        if rows.contains_key(&wallet.id) {
            return Err(StoreError::Duplicate(wallet.id));
        }

        let mut wallet = wallet.clone();
        wallet.balance.rescale(BALANCE_SCALE);
        rows.insert(
            wallet.id,
            Arc::new(WalletRow {
                lock: Arc::new(Mutex::new(())),
                committed: RwLock::new(wallet),
            }),
        );
        Ok(())
    }
}

/// A row locked by an in-memory transaction
struct HeldRow {
    row: Arc<WalletRow>,
    staged: Option<Decimal>,
    _guard: OwnedMutexGuard<()>,
}

/// Open in-memory transaction. Dropping it releases every lock and discards
/// staged balances.
pub struct InMemoryWalletTx {
    rows: Arc<RwLock<HashMap<WalletId, Arc<WalletRow>>>>,
    lock_timeout: Duration,
    held: HashMap<WalletId, HeldRow>,
}

impl InMemoryWalletTx {
    async fn acquire(&mut self, id: WalletId) -> StoreResult<Option<&mut HeldRow>> {
        if !self.held.contains_key(&id) {
            let row = match self.rows.read().await.get(&id).cloned() {
                Some(row) => row,
                None => return Ok(None),
            };

            let guard = tokio::time::timeout(self.lock_timeout, row.lock.clone().lock_owned())
                .await
                .map_err(|_| {
                    StoreError::Conflict(format!(
                        "lock wait on wallet {} exceeded {:?}",
                        id, self.lock_timeout
                    ))
                })?;

            self.held.insert(
                id,
                HeldRow {
                    row,
                    staged: None,
                    _guard: guard,
                },
            );
        }

        Ok(self.held.get_mut(&id))
    }
}

#[async_trait]
impl WalletTx for InMemoryWalletTx {
    async fn lock_wallet(&mut self, id: WalletId) -> StoreResult<Option<Wallet>> {
        let held = match self.acquire(id).await? {
            Some(held) => held,
            None => return Ok(None),
        };

        let mut wallet = held.row.committed.read().await.clone();
        if let Some(staged) = held.staged {
            wallet.balance = staged;
        }
        Ok(Some(wallet))
    }

    async fn update_balance(&mut self, id: WalletId, balance: Decimal) -> StoreResult<u64> {
        if balance < Decimal::ZERO {
            return Err(StoreError::ConstraintViolation(format!(
                "wallet {} balance must be non-negative",
                id
            )));
        }

        match self.acquire(id).await? {
            Some(held) => {
                let mut balance = balance;
                balance.rescale(BALANCE_SCALE);
                held.staged = Some(balance);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        for held in self.held.values() {
            if let Some(balance) = held.staged {
                held.row.committed.write().await.balance = balance;
            }
        }
        // Row locks are released when `self.held` drops
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    async fn seeded_store() -> InMemoryWalletStore {
        let store = InMemoryWalletStore::with_lock_timeout(Duration::from_millis(50));
        store
            .insert_wallet(&Wallet::new(WalletId(1), "user1", dec("100")))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_commit_publishes_staged_balance() {
        let store = seeded_store().await;

        let mut tx = store.begin().await.unwrap();
        let locked = tx.lock_wallet(WalletId(1)).await.unwrap().unwrap();
        assert_eq!(locked.balance, dec("100"));

        assert_eq!(tx.update_balance(WalletId(1), dec("150")).await.unwrap(), 1);

        // Not visible before commit
        let before = store.find_wallet(WalletId(1)).await.unwrap().unwrap();
        assert_eq!(before.balance, dec("100"));

        tx.commit().await.unwrap();

        let after = store.find_wallet(WalletId(1)).await.unwrap().unwrap();
        assert_eq!(after.balance, dec("150"));
    }

    #[tokio::test]
    async fn test_rollback_and_drop_discard_staged_balance() {
        let store = seeded_store().await;

        let mut tx = store.begin().await.unwrap();
        tx.update_balance(WalletId(1), dec("1")).await.unwrap();
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.update_balance(WalletId(1), dec("2")).await.unwrap();
        drop(tx);

        let wallet = store.find_wallet(WalletId(1)).await.unwrap().unwrap();
        assert_eq!(wallet.balance, dec("100"));
    }

    #[tokio::test]
    async fn test_second_locker_times_out_with_conflict() {
        let store = seeded_store().await;

        let mut first = store.begin().await.unwrap();
        first.lock_wallet(WalletId(1)).await.unwrap();

        let mut second = store.begin().await.unwrap();
        let err = second.lock_wallet(WalletId(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // Plain reads are not blocked by the held lock
        assert!(store.find_wallet(WalletId(1)).await.unwrap().is_some());

        drop(first);
        assert!(second.lock_wallet(WalletId(1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_missing_row_affects_nothing() {
        let store = seeded_store().await;
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.update_balance(WalletId(99), dec("1")).await.unwrap(), 0);
        assert!(tx.lock_wallet(WalletId(99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_negative_balance_is_a_constraint_violation() {
        let store = seeded_store().await;
        let mut tx = store.begin().await.unwrap();
        let err = tx.update_balance(WalletId(1), dec("-0.01")).await.unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = seeded_store().await;
        let err = store
            .insert_wallet(&Wallet::new(WalletId(1), "user2", dec("5")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(WalletId(1))));
    }
}
