//! # WalletStore Abstraction
//!
//! The durable source of truth for wallet rows. Two implementations:
//!
//! - **PgWalletStore**: production implementation on PostgreSQL
//! - **InMemoryWalletStore**: dev/test implementation with the same row-lock
//!   semantics, so concurrency tests run without infrastructure
//!
//! Mutations go through a [`WalletTx`]. Reading a row with
//! [`WalletTx::lock_wallet`] holds that row's lock until the transaction
//! commits, rolls back, or is dropped; dropping without commit discards every
//! staged write.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt;
use std::time::Duration;

use crate::models::{Wallet, WalletId};

/// Errors raised by store backends
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Row lock not acquired in time, serialization failure or deadlock.
    /// The whole read-modify-write may be retried.
    #[error("concurrent update conflict: {0}")]
    Conflict(String),

    #[error("wallet {0} already exists")]
    Duplicate(WalletId),

    /// A row-level constraint such as `balance >= 0` rejected the write
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// The backend did not answer within the configured bound
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    /// The task driving a commit stopped before reporting an outcome
    #[error("store task interrupted: {0}")]
    Interrupted(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            match db_err.code().as_deref() {
                // lock_not_available, serialization_failure, deadlock_detected
                Some("55P03") | Some("40001") | Some("40P01") => {
                    return StoreError::Conflict(db_err.message().to_string());
                }
                Some("23514") => {
                    return StoreError::ConstraintViolation(db_err.message().to_string());
                }
                _ => {}
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable wallet table with transactional writes
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Plain primary-key read of the last committed row. Never waits on row locks.
    async fn find_wallet(&self, id: WalletId) -> StoreResult<Option<Wallet>>;

    /// Begin a transaction. The caller decides whether it commits.
    async fn begin(&self) -> StoreResult<Box<dyn WalletTx>>;

    /// Provision a new wallet row (seeding and tests only)
    async fn insert_wallet(&self, wallet: &Wallet) -> StoreResult<()>;
}

/// An open store transaction scoped to a single wallet mutation
#[async_trait]
pub trait WalletTx: Send {
    /// Read a row and hold its lock for the rest of the transaction
    /// (`SELECT ... FOR UPDATE`).
    async fn lock_wallet(&mut self, id: WalletId) -> StoreResult<Option<Wallet>>;

    /// Stage a new balance for a row. Returns the number of rows affected.
    async fn update_balance(&mut self, id: WalletId, balance: Decimal) -> StoreResult<u64>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

impl fmt::Debug for dyn WalletStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletStore")
    }
}

impl fmt::Debug for dyn WalletTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletTx")
    }
}
