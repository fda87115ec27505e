use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{AppState, ErrorResponse};
use crate::services::AuthError;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug)]
pub struct AuthHttpError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for AuthHttpError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

fn map_error(error: AuthError) -> AuthHttpError {
    match error {
        AuthError::InvalidCredentials => AuthHttpError {
            status: StatusCode::UNAUTHORIZED,
            message: "Invalid username or password".to_string(),
        },
        AuthError::Hashing(_) | AuthError::Store(_) => {
            tracing::error!(error = %error, "Login failed");
            AuthHttpError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "Internal server error".to_string(),
            }
        }
    }
}

/// Handler for POST /v1/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AuthHttpError> {
    let Json(request) = payload.map_err(|e| AuthHttpError {
        status: StatusCode::BAD_REQUEST,
        message: e.body_text(),
    })?;

    let token = state
        .users
        .login(&request.username, &request.password)
        .await
        .map_err(map_error)?;

    Ok(Json(LoginResponse { token }))
}
