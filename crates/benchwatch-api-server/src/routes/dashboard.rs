// ABOUTME: Aggregate dashboard statistics endpoint

use crate::models::errors::ApiError;
use crate::state::AppState;
use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use tracing::instrument;

/// Counters shown at the top of the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStatsResponse {
    #[serde(flatten)]
    pub store: benchwatch_core::store::DashboardStats,
    pub websocket_subscribers: usize,
    pub uptime_seconds: u64,
}

/// Aggregate counters for the dashboard landing page.
#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    responses((status = 200, description = "Aggregate counters")),
    tag = "Dashboard"
)]
#[instrument(skip(state))]
pub async fn dashboard_stats(
    State(state): State<AppState>,
) -> Result<Json<DashboardStatsResponse>, ApiError> {
    let store_stats = state.store.dashboard_stats().await?;
    let hub_stats = state.hub.stats().await;
    Ok(Json(DashboardStatsResponse {
        store: store_stats,
        websocket_subscribers: hub_stats.subscribers,
        uptime_seconds: state.uptime_seconds(),
    }))
}

/// Clients last seen under test, from the registry.
#[utoipa::path(
    get,
    path = "/api/clients",
    responses((status = 200, description = "Registered client endpoints")),
    tag = "Dashboard"
)]
#[instrument(skip(state))]
pub async fn list_clients(
    State(state): State<AppState>,
) -> Json<Vec<benchwatch_types::ClientEndpoint>> {
    Json(state.registry.list())
}
