//! Wallet API Routes
//!
//! Balance read plus credit/debit. Every handler runs behind the bearer
//! middleware and acts on behalf of the [`AuthenticatedUser`] it inserted.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{AppState, ErrorResponse};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{Amount, WalletId};
use crate::services::WalletError;

/// Amount accepted as a JSON string (preferred, exact) or a JSON number
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AmountField {
    Text(String),
    Number(serde_json::Number),
}

impl AmountField {
    fn parse(&self) -> Result<Amount, WalletHttpError> {
        let raw = match self {
            AmountField::Text(s) => s.clone(),
            AmountField::Number(n) => n.to_string(),
        };
        raw.parse::<Amount>().map_err(|e| WalletHttpError {
            status: StatusCode::BAD_REQUEST,
            message: e.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct MutationRequest {
    pub amount: AmountField,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub wallet_id: WalletId,
    pub balance: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MutationResponse {
    pub status: String,
    pub balance: Decimal,
}

/// Wallet error HTTP response
#[derive(Debug)]
pub struct WalletHttpError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for WalletHttpError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Map service errors to HTTP status codes
fn map_error(error: WalletError) -> WalletHttpError {
    let status = match &error {
        WalletError::WalletNotFound(_) => StatusCode::NOT_FOUND,
        WalletError::AccessDenied(_) => StatusCode::FORBIDDEN,
        WalletError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
        WalletError::Conflict { .. } => StatusCode::CONFLICT,
        WalletError::BalanceOverflow(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WalletError::StoreUnavailable { .. } => {
            tracing::error!(error = %error, "Wallet request failed");
            return WalletHttpError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "Internal server error".to_string(), // Don't leak internal details
            };
        }
    };

    WalletHttpError {
        status,
        message: error.to_string(),
    }
}

fn parse_wallet_id(raw: &str) -> Result<WalletId, WalletHttpError> {
    raw.parse().map_err(|e: crate::models::InvalidWalletId| WalletHttpError {
        status: StatusCode::BAD_REQUEST,
        message: e.to_string(),
    })
}

fn parse_body(
    payload: Result<Json<MutationRequest>, JsonRejection>,
) -> Result<Amount, WalletHttpError> {
    let Json(request) = payload.map_err(|e| WalletHttpError {
        status: StatusCode::BAD_REQUEST,
        message: e.body_text(),
    })?;
    request.amount.parse()
}

/// Handler for GET /api/v1/wallets/{wallet_id}/balance
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(wallet_id): Path<String>,
) -> Result<Json<BalanceResponse>, WalletHttpError> {
    let wallet_id = parse_wallet_id(&wallet_id)?;

    let wallet = state
        .wallets
        .get_balance(wallet_id, &user.username)
        .await
        .map_err(map_error)?;

    Ok(Json(BalanceResponse {
        wallet_id: wallet.id,
        balance: wallet.balance,
    }))
}

/// Handler for POST /api/v1/wallets/{wallet_id}/credit
pub async fn credit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(wallet_id): Path<String>,
    payload: Result<Json<MutationRequest>, JsonRejection>,
) -> Result<Json<MutationResponse>, WalletHttpError> {
    let wallet_id = parse_wallet_id(&wallet_id)?;
    let amount = parse_body(payload)?;

    let wallet = state
        .wallets
        .credit_wallet(wallet_id, amount, &user.username)
        .await
        .map_err(map_error)?;

    Ok(Json(MutationResponse {
        status: "success".to_string(),
        balance: wallet.balance,
    }))
}

/// Handler for POST /api/v1/wallets/{wallet_id}/debit
pub async fn debit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(wallet_id): Path<String>,
    payload: Result<Json<MutationRequest>, JsonRejection>,
) -> Result<Json<MutationResponse>, WalletHttpError> {
    let wallet_id = parse_wallet_id(&wallet_id)?;
    let amount = parse_body(payload)?;

    let wallet = state
        .wallets
        .debit_wallet(wallet_id, amount, &user.username)
        .await
        .map_err(map_error)?;

    Ok(Json(MutationResponse {
        status: "success".to_string(),
        balance: wallet.balance,
    }))
}
