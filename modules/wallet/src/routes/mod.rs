//! HTTP surface
//!
//! - `GET  /api/health`, `GET /ping`
//! - `POST /v1/auth/login`
//! - `GET  /api/v1/wallets/{wallet_id}/balance` (bearer)
//! - `POST /api/v1/wallets/{wallet_id}/credit` (bearer)
//! - `POST /api/v1/wallets/{wallet_id}/debit` (bearer)

pub mod auth;
pub mod health;
pub mod wallets;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{auth::require_bearer, trace_id::trace_id_middleware};
use crate::services::{UserService, WalletService};

/// Error response wrapper
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub wallets: WalletService,
    pub users: UserService,
}

pub fn build_router(state: AppState) -> Router {
    let users = state.users.clone();
    let state = Arc::new(state);

    let wallet_routes = Router::new()
        .route(
            "/api/v1/wallets/{wallet_id}/balance",
            get(wallets::get_balance),
        )
        .route("/api/v1/wallets/{wallet_id}/credit", post(wallets::credit))
        .route("/api/v1/wallets/{wallet_id}/debit", post(wallets::debit))
        .route_layer(from_fn_with_state(users, require_bearer))
        .with_state(state.clone());

    Router::new()
        .route("/api/health", get(health::health))
        .route("/ping", get(health::ping))
        .route("/v1/auth/login", post(auth::login))
        .with_state(state)
        .merge(wallet_routes)
        .layer(from_fn(trace_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}
