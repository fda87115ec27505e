//! HTTP boundary tests: auth, status codes and response bodies

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use rust_decimal::Decimal;
use tower::ServiceExt;

use common::{body_json, dec, login, test_app};

fn balance_of(json: &serde_json::Value) -> Decimal {
    json["balance"].as_str().unwrap().parse().unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn test_health_and_ping() {
    let app = test_app().await;

    let response = app.router.clone().oneshot(get("/api/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-trace-id"));
    assert_eq!(body_json(response).await["status"], "healthy");

    let response = app.router.clone().oneshot(get("/ping", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({ "message": "pong" }));
}

#[tokio::test]
async fn test_trace_id_is_propagated() {
    let app = test_app().await;

    let request = Request::builder()
        .uri("/ping")
        .header("x-trace-id", "trace-abc")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-trace-id"], "trace-abc");
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    let app = test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/v1/auth/login")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"username":"user1","password":"wrong"}"#))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn test_wallet_routes_require_bearer_token() {
    let app = test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(get("/api/v1/wallets/1/balance", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router
        .clone()
        .oneshot(get("/api/v1/wallets/1/balance", Some("not-a-real-token")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_relogin_revokes_previous_token() {
    let app = test_app().await;
    let old = login(&app.router, "user1", "password1").await;
    let new = login(&app.router, "user1", "password1").await;

    let response = app
        .router
        .clone()
        .oneshot(get("/api/v1/wallets/1/balance", Some(&old)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router
        .clone()
        .oneshot(get("/api/v1/wallets/1/balance", Some(&new)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_ledger_scenario_over_http() {
    let app = test_app().await;
    let token = login(&app.router, "user1", "password1").await;

    let response = app
        .router
        .clone()
        .oneshot(get("/api/v1/wallets/1/balance", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["wallet_id"], 1);
    assert_eq!(balance_of(&json), dec("100"));

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/v1/wallets/1/credit",
            &token,
            serde_json::json!({ "amount": "50" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "success");
    assert_eq!(balance_of(&json), dec("150"));

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/v1/wallets/1/debit",
            &token,
            serde_json::json!({ "amount": "200" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/v1/wallets/1/debit",
            &token,
            serde_json::json!({ "amount": 25.25 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(balance_of(&body_json(response).await), dec("124.75"));

    // Balance read after mutations is fresh, and repopulates the cache
    let response = app
        .router
        .clone()
        .oneshot(get("/api/v1/wallets/1/balance", Some(&token)))
        .await
        .unwrap();
    assert_eq!(balance_of(&body_json(response).await), dec("124.75"));
    assert!(app.cache.contains_key("wallet_1"));
}

#[tokio::test]
async fn test_domain_error_status_codes() {
    let app = test_app().await;
    let token = login(&app.router, "user2", "password2").await;

    // Wallet 1 belongs to user1
    let response = app
        .router
        .clone()
        .oneshot(get("/api/v1/wallets/1/balance", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/v1/wallets/1/credit",
            &token,
            serde_json::json!({ "amount": "1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .router
        .clone()
        .oneshot(get("/api/v1/wallets/999/balance", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bad_requests() {
    let app = test_app().await;
    let token = login(&app.router, "user1", "password1").await;

    for uri in ["/api/v1/wallets/abc/balance", "/api/v1/wallets/-1/balance"] {
        let response = app
            .router
            .clone()
            .oneshot(get(uri, Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }

    for amount in [
        serde_json::json!("0"),
        serde_json::json!("-5"),
        serde_json::json!("ten"),
        serde_json::json!("0.000000001"),
        serde_json::json!(null),
    ] {
        let response = app
            .router
            .clone()
            .oneshot(post_json(
                "/api/v1/wallets/1/credit",
                &token,
                serde_json::json!({ "amount": amount }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", amount);
        assert!(body_json(response).await["error"].is_string());
    }

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/wallets/1/debit")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Nothing was applied
    let response = app
        .router
        .clone()
        .oneshot(get("/api/v1/wallets/1/balance", Some(&token)))
        .await
        .unwrap();
    assert_eq!(balance_of(&body_json(response).await), dec("100"));
}
