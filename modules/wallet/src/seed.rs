//! Demo data: `user1..user3` (passwords `password1..password3`) each owning
//! one wallet with 100, 200 and 300 respectively. Rows that already exist are
//! left untouched, so seeding is safe on every startup.

use rust_decimal::Decimal;

use crate::models::{Wallet, WalletId};
use crate::repos::{RepoError, StoreError, UserStoreError, WalletRepository};
use crate::services::{AuthError, UserService};

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("seeding users failed: {0}")]
    User(#[from] AuthError),

    #[error("seeding wallets failed: {0}")]
    Wallet(#[from] RepoError),
}

pub async fn seed_demo_data(
    users: &UserService,
    wallets: &WalletRepository,
) -> Result<(), SeedError> {
    for n in 1..=3i64 {
        let username = format!("user{}", n);
        let password = format!("password{}", n);

        match users.create_user(&username, &password).await {
            Ok(_) => tracing::info!(username = %username, "Seeded demo user"),
            Err(AuthError::Store(UserStoreError::Duplicate(_))) => {
                tracing::debug!(username = %username, "Demo user already present");
            }
            Err(e) => return Err(e.into()),
        }

        let wallet = Wallet::new(WalletId(n), username, Decimal::from(n * 100));
        match wallets.insert_wallet(&wallet).await {
            Ok(()) => tracing::info!(wallet_id = %wallet.id, "Seeded demo wallet"),
            Err(RepoError::Store {
                source: StoreError::Duplicate(_),
                ..
            }) => {
                tracing::debug!(wallet_id = %wallet.id, "Demo wallet already present");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
