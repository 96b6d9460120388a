// ABOUTME: Trend endpoints: test-wide, method-scoped and client-scoped analyses

use crate::models::errors::ApiError;
use crate::models::requests::TrendQuery;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::response::Json;
use benchwatch_types::TrendAnalysis;
use tracing::instrument;

const DEFAULT_WINDOW_DAYS: u32 = 30;

async fn run_analysis(
    state: &AppState,
    query: TrendQuery,
    client_override: Option<String>,
    method_override: Option<String>,
) -> Result<TrendAnalysis, ApiError> {
    let metric = query.metric_name()?;
    let analysis = state
        .trends
        .analyze(
            &query.test_name,
            metric,
            client_override.or(query.client),
            method_override.or(query.method),
            query.days.unwrap_or(DEFAULT_WINDOW_DAYS),
            query.forecast.unwrap_or(0),
        )
        .await?;
    Ok(analysis)
}

/// Trend of one metric for a test over a trailing window.
#[utoipa::path(
    get,
    path = "/api/trends",
    responses(
        (status = 200, description = "Trend analysis"),
        (status = 400, description = "Unknown metric or insufficient samples"),
    ),
    tag = "Trends"
)]
#[instrument(skip(state))]
pub async fn get_trends(
    State(state): State<AppState>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<TrendAnalysis>, ApiError> {
    Ok(Json(run_analysis(&state, query, None, None).await?))
}

/// Method-scoped trend.
#[utoipa::path(
    get,
    path = "/api/trends/method/{method}",
    responses((status = 200, description = "Method-scoped trend analysis")),
    tag = "Trends"
)]
#[instrument(skip(state))]
pub async fn get_method_trend(
    State(state): State<AppState>,
    Path(method): Path<String>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<TrendAnalysis>, ApiError> {
    Ok(Json(run_analysis(&state, query, None, Some(method)).await?))
}

/// Client-scoped trend.
#[utoipa::path(
    get,
    path = "/api/trends/client/{client}",
    responses((status = 200, description = "Client-scoped trend analysis")),
    tag = "Trends"
)]
#[instrument(skip(state))]
pub async fn get_client_trend(
    State(state): State<AppState>,
    Path(client): Path<String>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<TrendAnalysis>, ApiError> {
    Ok(Json(run_analysis(&state, query, Some(client), None).await?))
}
