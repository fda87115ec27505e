// Bearer-token authentication for wallet routes

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::routes::ErrorResponse;
use crate::services::UserService;

/// Principal resolved from the bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub username: String,
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Resolve `Authorization: Bearer <token>` and insert [`AuthenticatedUser`]
/// into request extensions
pub async fn require_bearer(
    State(users): State<UserService>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer(request.headers()) else {
        return unauthorized("Missing or malformed bearer token");
    };

    let user = match users.get_user_by_token(&token).await {
        Ok(Some(user)) => user,
        Ok(None) => return unauthorized("Invalid token"),
        Err(e) => {
            tracing::error!(error = %e, "Token lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal server error".to_string(),
                }),
            )
                .into_response();
        }
    };

    request.extensions_mut().insert(AuthenticatedUser {
        username: user.username,
    });

    next.run(request).await
}

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
