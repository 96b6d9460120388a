// ABOUTME: Baseline endpoints: list, create/update, soft delete

use crate::models::errors::ApiError;
use crate::models::requests::CreateBaselineRequest;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use benchwatch_types::{Baseline, Event, EventKind};
use serde::Deserialize;
use tracing::instrument;
use validator::Validate;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineListQuery {
    pub test_name: Option<String>,
}

/// Active baselines, optionally filtered by test.
#[utoipa::path(
    get,
    path = "/api/baselines",
    responses((status = 200, description = "Active baselines")),
    tag = "Baselines"
)]
#[instrument(skip(state))]
pub async fn list_baselines(
    State(state): State<AppState>,
    Query(query): Query<BaselineListQuery>,
) -> Result<Json<Vec<Baseline>>, ApiError> {
    Ok(Json(state.baselines.list(query.test_name.as_deref()).await?))
}

/// Pin a run as a named baseline.
#[utoipa::path(
    post,
    path = "/api/baselines",
    responses(
        (status = 201, description = "Baseline stored"),
        (status = 404, description = "Unknown run id"),
        (status = 409, description = "Name already owned by another test"),
    ),
    tag = "Baselines"
)]
#[instrument(skip(state, request), fields(name = %request.name))]
pub async fn create_baseline(
    State(state): State<AppState>,
    Json(request): Json<CreateBaselineRequest>,
) -> Result<(StatusCode, Json<Baseline>), ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let baseline = state
        .baselines
        .set_baseline(&request.run_id, &request.name, &request.description)
        .await?;

    state
        .hub
        .publish(Event::for_run(
            EventKind::BaselineUpdated,
            baseline.run_id.clone(),
            serde_json::json!({
                "name": baseline.name,
                "test_name": baseline.test_name,
                "run_id": baseline.run_id,
            }),
        ))
        .await;

    Ok((StatusCode::CREATED, Json(baseline)))
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    /// Trailing window in days; defaults to 30
    pub days: Option<u32>,
}

/// Deviation history of a baseline's test versus its pinned latency.
#[utoipa::path(
    get,
    path = "/api/baselines/{id}/history",
    responses(
        (status = 200, description = "Deviation history"),
        (status = 404, description = "Unknown baseline"),
    ),
    tag = "Baselines"
)]
#[instrument(skip(state))]
pub async fn baseline_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<benchwatch_types::BaselineHistoryPoint>>, ApiError> {
    Ok(Json(
        state
            .baselines
            .history(&id, query.days.unwrap_or(30))
            .await?,
    ))
}

/// Soft-delete a baseline by name.
#[utoipa::path(
    delete,
    path = "/api/baselines/{id}",
    responses(
        (status = 204, description = "Baseline deactivated"),
        (status = 404, description = "Unknown baseline"),
    ),
    tag = "Baselines"
)]
#[instrument(skip(state))]
pub async fn delete_baseline(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.baselines.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
