//! PostgreSQL implementation of [`WalletStore`]

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use std::future::Future;
use std::time::Duration;

use super::wallet_store::{StoreError, StoreResult, WalletStore, WalletTx};
use crate::models::{Wallet, WalletId};

pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client-side slack on top of `statement_timeout`, so the server reports
/// the cancellation before the client gives up on the round trip
const CLIENT_GRACE: Duration = Duration::from_millis(500);

/// WalletStore backed by the `wallets` table
///
/// Every transaction sets a local `lock_timeout`, so a writer queued behind a
/// stuck row lock fails with [`StoreError::Conflict`] instead of waiting
/// forever. It also sets a local `statement_timeout`, and every call is
/// bounded on the client as well, so a slow or partitioned server surfaces
/// as [`StoreError::Timeout`].
#[derive(Debug, Clone)]
pub struct PgWalletStore {
    pool: PgPool,
    lock_timeout: Duration,
    statement_timeout: Duration,
}

impl PgWalletStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self {
            pool,
            lock_timeout,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
        }
    }

    pub fn with_statement_timeout(mut self, statement_timeout: Duration) -> Self {
        self.statement_timeout = statement_timeout;
        self
    }

    fn client_bound(&self) -> Duration {
        self.statement_timeout.max(self.lock_timeout) + CLIENT_GRACE
    }
}

async fn bounded<T, F>(limit: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(StoreError::from),
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

#[async_trait]
impl WalletStore for PgWalletStore {
    async fn find_wallet(&self, id: WalletId) -> StoreResult<Option<Wallet>> {
        let query = sqlx::query_as::<_, Wallet>(
            r#"
            SELECT id, owner, balance
            FROM wallets
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool);

        bounded(self.client_bound(), query).await
    }

    async fn begin(&self) -> StoreResult<Box<dyn WalletTx>> {
        let limit = self.client_bound();
        let mut tx = bounded(limit, self.pool.begin()).await?;

        let settings = sqlx::query(
            "SELECT set_config('lock_timeout', $1, true), set_config('statement_timeout', $2, true)",
        )
        .bind(format!("{}ms", self.lock_timeout.as_millis()))
        .bind(format!("{}ms", self.statement_timeout.as_millis()))
        .execute(&mut *tx);
        bounded(limit, settings).await?;

        Ok(Box::new(PgWalletTx { tx, limit }))
    }

    async fn insert_wallet(&self, wallet: &Wallet) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO wallets (id, owner, balance)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(wallet.id)
        .bind(&wallet.owner)
        .bind(wallet.balance)
        .execute(&self.pool);

        match tokio::time::timeout(self.client_bound(), result).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => {
                if let Some(db_err) = e.as_database_error() {
                    if db_err.code().as_deref() == Some("23505") {
                        return Err(StoreError::Duplicate(wallet.id));
                    }
                }
                Err(e.into())
            }
            Err(_) => Err(StoreError::Timeout(self.client_bound())),
        }
    }
}

/// Open Postgres transaction. Dropping it without commit rolls back.
pub struct PgWalletTx {
    tx: Transaction<'static, Postgres>,
    limit: Duration,
}

#[async_trait]
impl WalletTx for PgWalletTx {
    async fn lock_wallet(&mut self, id: WalletId) -> StoreResult<Option<Wallet>> {
        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            SELECT id, owner, balance
            FROM wallets
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx);

        bounded(self.limit, wallet).await
    }

    async fn update_balance(&mut self, id: WalletId, balance: Decimal) -> StoreResult<u64> {
        let update = sqlx::query(
            r#"
            UPDATE wallets
            SET balance = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(balance)
        .execute(&mut *self.tx);

        let result = bounded(self.limit, update).await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        bounded(self.limit, self.tx.commit()).await
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        bounded(self.limit, self.tx.rollback()).await
    }
}
