//! Shared fixtures for wallet integration tests
//!
//! Everything here runs on the in-memory store and cache, so no Postgres or
//! Redis is needed. Postgres-backed tests build their own pool and skip when
//! `DATABASE_URL` is unreachable.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tower::ServiceExt;

use wallet_rs::models::{Wallet, WalletId};
use wallet_rs::repos::{
    CacheError, CacheResult, InMemoryUserStore, InMemoryWalletCache, InMemoryWalletStore,
    StoreError, StoreResult, WalletCache, WalletRepository, WalletStore, WalletTx,
};
use wallet_rs::services::{PasswordPolicy, UserService, WalletService};
use wallet_rs::{build_router, AppState};

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Argon2 parameters small enough to keep tests fast
pub fn test_password_policy() -> PasswordPolicy {
    PasswordPolicy {
        memory_kb: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

/// Store holding `{id: 1, owner: "user1", balance: 100}` and
/// `{id: 2, owner: "user2", balance: 200}`
pub async fn seeded_store() -> InMemoryWalletStore {
    let store = InMemoryWalletStore::new();
    store
        .insert_wallet(&Wallet::new(WalletId(1), "user1", dec("100")))
        .await
        .unwrap();
    store
        .insert_wallet(&Wallet::new(WalletId(2), "user2", dec("200")))
        .await
        .unwrap();
    store
}

// ============================================================================
// HTTP
// ============================================================================

pub struct TestApp {
    pub router: Router,
    pub cache: InMemoryWalletCache,
}

/// Router over a seeded in-memory store, an in-memory cache and users
/// `user1`/`user2` with passwords `password1`/`password2`
pub async fn test_app() -> TestApp {
    let cache = InMemoryWalletCache::new();
    let repo = WalletRepository::new(Arc::new(seeded_store().await), Some(Arc::new(cache.clone())));

    let users = UserService::new(Arc::new(InMemoryUserStore::new()), test_password_policy());
    users.create_user("user1", "password1").await.unwrap();
    users.create_user("user2", "password2").await.unwrap();

    let router = build_router(AppState {
        wallets: WalletService::new(repo),
        users,
    });

    TestApp { router, cache }
}

/// Read response body as JSON.
pub async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn login(router: &Router, username: &str, password: &str) -> String {
    let body = serde_json::json!({ "username": username, "password": password });
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/auth/login")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string()
}

// ============================================================================
// FAULT INJECTION
// ============================================================================

/// Cache whose every call fails
#[derive(Default)]
pub struct FailingCache {
    pub calls: AtomicU32,
}

#[async_trait]
impl WalletCache for FailingCache {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: String) -> CacheResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Timeout(Duration::from_millis(250)))
    }
}

/// In-memory cache whose deletes take `delay` to land
pub struct SlowDeleteCache {
    pub inner: InMemoryWalletCache,
    pub delay: Duration,
}

#[async_trait]
impl WalletCache for SlowDeleteCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> CacheResult<()> {
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete(key).await
    }
}

/// In-memory cache that parks the first `set` until [`GatedCache::release`]
///
/// `entered` is notified once the parked `set` is waiting.
pub struct GatedCache {
    pub inner: InMemoryWalletCache,
    pub entered: Notify,
    gate: Semaphore,
    armed: AtomicBool,
}

impl GatedCache {
    pub fn new(inner: InMemoryWalletCache) -> Self {
        Self {
            inner,
            entered: Notify::new(),
            gate: Semaphore::new(0),
            armed: AtomicBool::new(true),
        }
    }

    pub fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl WalletCache for GatedCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> CacheResult<()> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.gate.acquire().await.unwrap().forget();
        }
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.inner.delete(key).await
    }
}

/// Store whose transactions fail to begin a fixed number of times
pub struct FlakyStore {
    pub inner: InMemoryWalletStore,
    pub conflicts_left: AtomicU32,
    /// Fail with a database error instead of a conflict
    pub hard_failure: bool,
}

impl FlakyStore {
    pub fn conflicting(inner: InMemoryWalletStore, conflicts: u32) -> Self {
        Self {
            inner,
            conflicts_left: AtomicU32::new(conflicts),
            hard_failure: false,
        }
    }

    pub fn broken(inner: InMemoryWalletStore) -> Self {
        Self {
            inner,
            conflicts_left: AtomicU32::new(u32::MAX),
            hard_failure: true,
        }
    }
}

#[async_trait]
impl WalletStore for FlakyStore {
    async fn find_wallet(&self, id: WalletId) -> StoreResult<Option<Wallet>> {
        self.inner.find_wallet(id).await
    }

    async fn begin(&self) -> StoreResult<Box<dyn WalletTx>> {
        let remaining = self.conflicts_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.conflicts_left.store(remaining - 1, Ordering::SeqCst);
            if self.hard_failure {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            return Err(StoreError::Conflict("could not obtain lock on row".to_string()));
        }
        self.inner.begin().await
    }

    async fn insert_wallet(&self, wallet: &Wallet) -> StoreResult<()> {
        self.inner.insert_wallet(wallet).await
    }
}
