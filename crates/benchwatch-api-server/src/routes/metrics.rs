// ABOUTME: Raw time-series selection endpoint

use crate::models::errors::ApiError;
use crate::models::requests::MetricQueryRequest;
use crate::state::AppState;
use axum::extract::State;
use axum::response::Json;
use benchwatch_types::TimeSeriesMetric;
use tracing::instrument;

/// Select time-series points by metric names, client, method and window.
#[utoipa::path(
    post,
    path = "/api/metrics/query",
    responses(
        (status = 200, description = "Matching time-series points"),
        (status = 400, description = "Unknown metric name"),
    ),
    tag = "Metrics"
)]
#[instrument(skip(state, request))]
pub async fn query_metrics(
    State(state): State<AppState>,
    Json(request): Json<MetricQueryRequest>,
) -> Result<Json<Vec<TimeSeriesMetric>>, ApiError> {
    let query = request.into_query()?;
    Ok(Json(state.store.query_metrics(&query).await?))
}
