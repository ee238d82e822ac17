//! Health check endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Health status ("ok" or "unhealthy")
    pub status: String,
}

/// Detailed health check response for the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiHealthResponse {
    /// Overall health status
    pub status: String,

    /// Catalog store connectivity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Server name from configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Server uptime in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<u64>,

    /// Server version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Basic health check endpoint.
///
/// `GET /health`
///
/// Returns quickly without touching the store; suitable for load balancer
/// probes.
pub async fn health_check() -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "ok".to_string(),
    })
}

/// Detailed API health check endpoint.
///
/// `GET /api/health`
///
/// # Returns
///
/// - `200 OK` when the catalog store answers
/// - `503 Service Unavailable` otherwise
pub async fn api_health(State(state): State<AppState>) -> (StatusCode, Json<ApiHealthResponse>) {
    let db_healthy = state.store.ping().await;

    let (status, status_code, database) = if db_healthy {
        ("ok", StatusCode::OK, "connected")
    } else {
        ("unhealthy", StatusCode::SERVICE_UNAVAILABLE, "disconnected")
    };

    let response = ApiHealthResponse {
        status: status.to_string(),
        database: Some(database.to_string()),
        server: Some(state.config.server_name.clone()),
        uptime_seconds: Some(state.uptime_seconds()),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    };

    (status_code, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::testing::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_health_check() {
        let response = health_check().await;
        assert_eq!(response.status, "ok");
    }

    #[tokio::test]
    async fn test_api_health_reports_store_down() {
        let store = Arc::new(MemoryStore::default());
        let state = AppState::new(store.clone(), AppConfig::default());

        let (code, Json(body)) = api_health(State(state.clone())).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body.database.as_deref(), Some("connected"));

        store.set_unavailable(true);
        let (code, Json(body)) = api_health(State(state)).await;
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "unhealthy");
    }
}
