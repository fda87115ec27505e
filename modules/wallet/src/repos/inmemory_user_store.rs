//! In-memory implementation of the UserStore trait for testing and development

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use super::user_store::{UserStore, UserStoreError};
use crate::models::User;

/// UserStore keyed by username
#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<DashMap<String, User>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserStoreError> {
        Ok(self.users.get(username).map(|u| u.value().clone()))
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<User>, UserStoreError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.token_hash.as_deref() == Some(token_hash))
            .map(|u| u.value().clone()))
    }

    async fn set_token_hash(&self, user_id: i64, token_hash: &str) -> Result<(), UserStoreError> {
        let mut user = self
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(UserStoreError::NotFound(user_id))?;
        user.token_hash = Some(token_hash.to_string());
        Ok(())
    }

    async fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<User, UserStoreError> {
        use dashmap::mapref::entry::Entry;

        match self.users.entry(username.to_string()) {
            Entry::Occupied(_) => Err(UserStoreError::Duplicate(username.to_string())),
            Entry::Vacant(slot) => {
                let user = User {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                    username: username.to_string(),
                    password_hash: password_hash.to_string(),
                    token_hash: None,
                };
                slot.insert(user.clone());
                Ok(user)
            }
        }
    }
}
