//! Liveness endpoints. Neither touches the store or the cache.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Pong {
    pub message: &'static str,
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn ping() -> Json<Pong> {
    Json(Pong { message: "pong" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_reports_package_identity() {
        let Json(status) = health().await;
        assert_eq!(status.status, "healthy");
        assert_eq!(status.service, "wallet-rs");
        assert_eq!(status.version, env!("CARGO_PKG_VERSION"));
    }
}
