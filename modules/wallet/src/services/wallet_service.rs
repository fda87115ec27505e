//! Wallet Ledger Service
//!
//! Balance reads and the two balance mutations:
//! - `get_balance`: cache-aside read + ownership check
//! - `credit_wallet` / `debit_wallet`: ownership check, then a locked
//!   read-modify-write inside one store transaction
//!
//! The row lock taken by `lock_wallet` serializes concurrent mutations of the
//! same wallet. A lock timeout, serialization failure or deadlock surfaces as
//! a conflict and the whole read-modify-write is retried a bounded number of
//! times.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{max_balance, Amount, Wallet, WalletId};
use crate::repos::{RepoError, WalletRepository, WalletTransaction};

pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("wallet {0} not found")]
    WalletNotFound(WalletId),

    #[error("user does not own wallet {0}")]
    AccessDenied(WalletId),

    #[error("insufficient funds in wallet {wallet_id}")]
    InsufficientFunds { wallet_id: WalletId },

    #[error("balance of wallet {0} would exceed the representable range")]
    BalanceOverflow(WalletId),

    #[error("wallet {wallet_id} is busy, gave up after {attempts} attempts")]
    Conflict { wallet_id: WalletId, attempts: u32 },

    #[error("{operation} failed for wallet {wallet_id}: {source}")]
    StoreUnavailable {
        operation: &'static str,
        wallet_id: WalletId,
        #[source]
        source: crate::repos::StoreError,
    },
}

impl From<RepoError> for WalletError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::WalletNotFound(id) => WalletError::WalletNotFound(id),
            RepoError::Conflict { wallet_id, .. } => WalletError::Conflict {
                wallet_id,
                attempts: 1,
            },
            RepoError::Store {
                operation,
                wallet_id,
                source,
            } => WalletError::StoreUnavailable {
                operation,
                wallet_id,
                source,
            },
        }
    }
}

/// Direction of a balance mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mutation {
    Credit,
    Debit,
}

impl Mutation {
    fn as_str(&self) -> &'static str {
        match self {
            Mutation::Credit => "credit",
            Mutation::Debit => "debit",
        }
    }
}

/// Outcome of a single read-modify-write attempt
enum Attempt {
    Done(Wallet),
    Retry(String),
}

#[derive(Clone)]
pub struct WalletService {
    repo: WalletRepository,
    max_conflict_retries: u32,
}

impl WalletService {
    pub fn new(repo: WalletRepository) -> Self {
        Self::with_max_conflict_retries(repo, DEFAULT_MAX_CONFLICT_RETRIES)
    }

    /// `max_conflict_retries` counts retries after the first attempt
    pub fn with_max_conflict_retries(repo: WalletRepository, max_conflict_retries: u32) -> Self {
        Self {
            repo,
            max_conflict_retries,
        }
    }

    /// Return the wallet if it exists and `username` owns it
    pub async fn get_balance(
        &self,
        wallet_id: WalletId,
        username: &str,
    ) -> Result<Wallet, WalletError> {
        let wallet = self.repo.get_wallet(wallet_id).await?;

        if !wallet.is_owned_by(username) {
            tracing::warn!(wallet_id = %wallet_id, username = %username, "Balance read denied");
            return Err(WalletError::AccessDenied(wallet_id));
        }

        Ok(wallet)
    }

    /// Add `amount` to the wallet and return the committed snapshot
    pub async fn credit_wallet(
        &self,
        wallet_id: WalletId,
        amount: Amount,
        username: &str,
    ) -> Result<Wallet, WalletError> {
        self.mutate(wallet_id, amount, username, Mutation::Credit)
            .await
    }

    /// Subtract `amount` from the wallet and return the committed snapshot
    ///
    /// Fails with [`WalletError::InsufficientFunds`] and leaves the row
    /// untouched when the balance would go negative.
    pub async fn debit_wallet(
        &self,
        wallet_id: WalletId,
        amount: Amount,
        username: &str,
    ) -> Result<Wallet, WalletError> {
        self.mutate(wallet_id, amount, username, Mutation::Debit)
            .await
    }

    async fn mutate(
        &self,
        wallet_id: WalletId,
        amount: Amount,
        username: &str,
        mutation: Mutation,
    ) -> Result<Wallet, WalletError> {
        // Early rejection without opening a transaction
        self.get_balance(wallet_id, username).await?;

        let attempts = self.max_conflict_retries.saturating_add(1);
        for attempt in 1..=attempts {
            match self.try_mutate(wallet_id, amount, username, mutation).await? {
                Attempt::Done(wallet) => {
                    tracing::info!(
                        wallet_id = %wallet_id,
                        username = %username,
                        operation = mutation.as_str(),
                        amount = %amount,
                        balance = %wallet.balance,
                        "Wallet balance updated"
                    );
                    return Ok(wallet);
                }
                Attempt::Retry(reason) => {
                    tracing::warn!(
                        wallet_id = %wallet_id,
                        operation = mutation.as_str(),
                        attempt,
                        max_attempts = attempts,
                        reason = %reason,
                        "Conflicting update, retrying"
                    );
                }
            }
        }

        tracing::warn!(
            wallet_id = %wallet_id,
            operation = mutation.as_str(),
            attempts,
            "Giving up after repeated conflicts"
        );
        Err(WalletError::Conflict {
            wallet_id,
            attempts,
        })
    }

    async fn try_mutate(
        &self,
        wallet_id: WalletId,
        amount: Amount,
        username: &str,
        mutation: Mutation,
    ) -> Result<Attempt, WalletError> {
        let mut tx = match self.repo.begin(wallet_id).await {
            Ok(tx) => tx,
            Err(RepoError::Conflict { reason, .. }) => return Ok(Attempt::Retry(reason)),
            Err(e) => return Err(log_store_failure(e)),
        };

        let current = match self.repo.lock_wallet(&mut tx, wallet_id).await {
            Ok(wallet) => wallet,
            Err(e) => return self.abort(tx, e).await,
        };

        // Ownership is immutable, but the locked row is the authoritative copy
        if !current.is_owned_by(username) {
            self.rollback_quietly(tx).await;
            return Err(WalletError::AccessDenied(wallet_id));
        }

        let new_balance = match apply(wallet_id, current.balance, amount.value(), mutation) {
            Ok(balance) => balance,
            Err(rejection) => {
                self.rollback_quietly(tx).await;
                if let WalletError::InsufficientFunds { .. } = rejection {
                    tracing::info!(
                        wallet_id = %wallet_id,
                        balance = %current.balance,
                        amount = %amount,
                        "Debit rejected, insufficient funds"
                    );
                }
                return Err(rejection);
            }
        };

        if let Err(e) = self.repo.update_wallet(&mut tx, wallet_id, new_balance).await {
            return self.abort(tx, e).await;
        }

        match self.repo.commit(tx).await {
            Ok(()) => {}
            Err(RepoError::Conflict { reason, .. }) => return Ok(Attempt::Retry(reason)),
            Err(e) => return Err(log_store_failure(e)),
        }

        Ok(Attempt::Done(Wallet::new(wallet_id, current.owner, new_balance)))
    }

    /// Roll back after a repository error; conflicts become a retry
    async fn abort(&self, tx: WalletTransaction, err: RepoError) -> Result<Attempt, WalletError> {
        self.rollback_quietly(tx).await;
        match err {
            RepoError::Conflict { reason, .. } => Ok(Attempt::Retry(reason)),
            RepoError::WalletNotFound(id) => Err(WalletError::WalletNotFound(id)),
            other => Err(log_store_failure(other)),
        }
    }

    async fn rollback_quietly(&self, tx: WalletTransaction) {
        let wallet_id = tx.wallet_id();
        if let Err(e) = self.repo.rollback(tx).await {
            tracing::error!(wallet_id = %wallet_id, error = %e, "Rollback failed");
        }
    }
}

fn log_store_failure(err: RepoError) -> WalletError {
    tracing::error!(error = %err, "Wallet store operation failed");
    err.into()
}

/// Compute the post-mutation balance
fn apply(
    id: WalletId,
    balance: Decimal,
    amount: Decimal,
    mutation: Mutation,
) -> Result<Decimal, WalletError> {
    match mutation {
        Mutation::Credit => match balance.checked_add(amount) {
            Some(result) if result <= max_balance() => Ok(result),
            _ => Err(WalletError::BalanceOverflow(id)),
        },
        Mutation::Debit => match balance.checked_sub(amount) {
            Some(result) if result >= Decimal::ZERO => Ok(result),
            Some(_) => Err(WalletError::InsufficientFunds { wallet_id: id }),
            None => Err(WalletError::BalanceOverflow(id)),
        },
    }
}
