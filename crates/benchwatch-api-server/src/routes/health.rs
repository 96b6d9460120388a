// ABOUTME: Health check endpoint reporting component liveness and version

use crate::models::responses::{ComponentHealth, HealthResponse};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use chrono::Utc;
use std::collections::HashMap;
use tracing::instrument;

/// Liveness + version, with a live database round-trip.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Health check successful", body = HealthResponse),
    ),
    tag = "Health"
)]
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let mut components = HashMap::new();

    let database_status = match state.store.ping().await {
        Ok(()) => ComponentHealth {
            status: "healthy".to_string(),
            last_check: Utc::now(),
            details: Some("Database reachable".to_string()),
        },
        Err(e) => ComponentHealth {
            status: "degraded".to_string(),
            last_check: Utc::now(),
            details: Some(format!("Database check failed: {e}")),
        },
    };
    let degraded = database_status.status != "healthy";
    components.insert("database".to_string(), database_status);

    let hub_stats = state.hub.stats().await;
    components.insert(
        "notification_hub".to_string(),
        ComponentHealth {
            status: "healthy".to_string(),
            last_check: Utc::now(),
            details: Some(format!("{} subscriber(s)", hub_stats.subscribers)),
        },
    );

    let response = HealthResponse {
        status: if degraded { "degraded" } else { "healthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        components,
    };

    (StatusCode::OK, Json(response))
}
