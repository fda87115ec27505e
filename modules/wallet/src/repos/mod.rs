pub mod inmemory_user_store;
pub mod inmemory_wallet_store;
pub mod pg_user_store;
pub mod pg_wallet_store;
pub mod redis_wallet_cache;
pub mod user_store;
pub mod wallet_cache;
pub mod wallet_repo;
pub mod wallet_store;

pub use inmemory_user_store::InMemoryUserStore;
pub use inmemory_wallet_store::InMemoryWalletStore;
pub use pg_user_store::PgUserStore;
pub use pg_wallet_store::PgWalletStore;
pub use redis_wallet_cache::RedisWalletCache;
pub use user_store::{UserStore, UserStoreError};
pub use wallet_cache::{CacheError, CacheResult, InMemoryWalletCache, WalletCache};
pub use wallet_repo::{RepoError, RepoResult, WalletRepository, WalletTransaction};
pub use wallet_store::{StoreError, StoreResult, WalletStore, WalletTx};
