//! Username/password login and bearer-token resolution
//!
//! Passwords are stored as argon2id PHC strings. Tokens are 32 random bytes,
//! hex encoded; only their SHA-256 digest is persisted, and a new login
//! replaces the previous token.

use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;

use crate::models::User;
use crate::repos::{UserStore, UserStoreError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("user store error: {0}")]
    Store(#[from] UserStoreError),
}

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub memory_kb: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            memory_kb: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl PasswordPolicy {
    pub fn argon2(&self) -> Result<Argon2<'static>, AuthError> {
        use argon2::{Algorithm, Params, Version};
        let params = Params::new(self.memory_kb, self.iterations, self.parallelism, None)
            .map_err(|e| AuthError::Hashing(format!("invalid argon2 params: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

pub fn hash_password(policy: &PasswordPolicy, password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = policy
        .argon2()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(
    policy: &PasswordPolicy,
    password: &str,
    stored_hash: &str,
) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| AuthError::Hashing(e.to_string()))?;
    Ok(policy
        .argon2()?
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    policy: PasswordPolicy,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, policy: PasswordPolicy) -> Self {
        Self { store, policy }
    }

    /// Verify credentials and issue a fresh bearer token
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let user = match self.store.find_by_username(username).await? {
            Some(user) => user,
            None => {
                tracing::info!(username = %username, "Login rejected, unknown user");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !verify_password(&self.policy, password, &user.password_hash)? {
            tracing::info!(username = %username, "Login rejected, wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = generate_token();
        self.store
            .set_token_hash(user.id, &hash_token(&token))
            .await?;

        tracing::info!(username = %username, "User logged in");
        Ok(token)
    }

    /// Resolve a raw bearer token to its user
    pub async fn get_user_by_token(&self, token: &str) -> Result<Option<User>, AuthError> {
        Ok(self.store.find_by_token_hash(&hash_token(token)).await?)
    }

    /// Provision a user with a hashed password (seeding only)
    pub async fn create_user(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let password_hash = hash_password(&self.policy, password)?;
        Ok(self.store.insert_user(username, &password_hash).await?)
    }
}
