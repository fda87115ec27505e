use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Number of fractional digits every balance is stored with (`NUMERIC(28, 8)`).
pub const BALANCE_SCALE: u32 = 8;

/// Largest balance a `NUMERIC(28, 8)` column holds
pub fn max_balance() -> Decimal {
    Decimal::from_i128_with_scale(10i128.pow(28) - 1, BALANCE_SCALE)
}

// ============================================================================
// WALLET
// ============================================================================

/// Primary key of a wallet row.
///
/// Backed by a non-negative `BIGINT`; parsing from a path segment rejects
/// negative and non-numeric input.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct WalletId(pub i64);

impl WalletId {
    /// Cache key for this wallet's snapshot
    pub fn cache_key(&self) -> String {
        format!("wallet_{}", self.0)
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid wallet id: {0}")]
pub struct InvalidWalletId(pub String);

impl FromStr for WalletId {
    type Err = InvalidWalletId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: u64 = s.parse().map_err(|_| InvalidWalletId(s.to_string()))?;
        i64::try_from(raw)
            .map(WalletId)
            .map_err(|_| InvalidWalletId(s.to_string()))
    }
}

/// Wallet snapshot as stored in the database and in the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Wallet {
    pub id: WalletId,
    /// Username of the owning user; immutable after provisioning
    pub owner: String,
    pub balance: Decimal,
}

impl Wallet {
    pub fn new(id: WalletId, owner: impl Into<String>, balance: Decimal) -> Self {
        let mut balance = balance;
        balance.rescale(BALANCE_SCALE);
        Self {
            id,
            owner: owner.into(),
            balance,
        }
    }

    pub fn is_owned_by(&self, username: &str) -> bool {
        self.owner == username
    }
}

// ============================================================================
// AMOUNT
// ============================================================================

/// A strictly positive decimal amount with at most [`BALANCE_SCALE`]
/// fractional digits.
///
/// Credits and debits only accept this type, so a zero, negative or
/// over-precise amount cannot reach the ledger service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amount(Decimal);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is not a valid decimal: {0}")]
    Malformed(String),

    #[error("amount must be greater than zero")]
    NotPositive,

    #[error("amount has more than {} fractional digits", BALANCE_SCALE)]
    TooPrecise,
}

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value <= Decimal::ZERO {
            return Err(AmountError::NotPositive);
        }
        if value.normalize().scale() > BALANCE_SCALE {
            return Err(AmountError::TooPrecise);
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|_| AmountError::Malformed(s.to_string()))?;
        Self::new(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// USER
// ============================================================================

/// User row consumed by the auth layer
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    /// SHA-256 hex digest of the current bearer token, if the user has logged in
    pub token_hash: Option<String>,
}
