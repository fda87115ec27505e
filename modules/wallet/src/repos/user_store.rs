//! User lookups for the bearer-token auth layer
//!
//! Tokens are never stored raw: callers pass the SHA-256 hex digest produced
//! by `services::user_service::hash_token`.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use crate::models::User;

/// Errors that can occur during user store operations
#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("user already exists: {0}")]
    Duplicate(String),

    #[error("user not found: id={0}")]
    NotFound(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserStoreError>;

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<User>, UserStoreError>;

    /// Replace the user's current token digest
    async fn set_token_hash(&self, user_id: i64, token_hash: &str) -> Result<(), UserStoreError>;

    async fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<User, UserStoreError>;
}

impl fmt::Debug for dyn UserStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserStore")
    }
}
