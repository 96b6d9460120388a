// Copyright 2025 Benchwatch Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// ABOUTME: Run endpoints: ingest, listing, summaries, reports, method
// breakdowns, regressions and acknowledgements

use crate::models::errors::ApiError;
use crate::models::requests::{AcknowledgeRequest, RunsQuery};
use crate::models::responses::MethodBreakdownResponse;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use benchwatch_types::{
    BenchmarkResult, DetectionFilter, EventKind, HistoricRun, Regression, RegressionReport,
    RegressionThresholds, RunConfig, RunListing,
};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::instrument;
use utoipa::ToSchema;
use validator::Validate;

/// Ingest body: the completed result plus its resolved run configuration.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IngestRequest {
    pub result: BenchmarkResult,
    #[serde(default)]
    pub config: RunConfig,
}

/// Persist a completed benchmark result and announce it.
#[utoipa::path(
    post,
    path = "/api/runs",
    responses(
        (status = 201, description = "Run persisted"),
        (status = 400, description = "Invalid run window or test name"),
        (status = 422, description = "Incoherent benchmark totals"),
    ),
    tag = "Runs"
)]
#[instrument(skip(state, request), fields(test_name = %request.result.test_name))]
pub async fn ingest_run(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<(StatusCode, Json<HistoricRun>), ApiError> {
    let run = state.store.save_run(&request.result, &request.config).await?;

    if !request.config.clients.is_empty() {
        state.registry.replace_all(request.config.clients.clone());
    }
    state.trends.invalidate().await;
    state
        .hub
        .publish(benchwatch_types::Event::for_run(
            EventKind::NewRun,
            run.id.clone(),
            serde_json::json!({
                "run_id": run.id,
                "test_name": run.test_name,
                "clients": run.clients,
            }),
        ))
        .await;

    Ok((StatusCode::CREATED, Json(run)))
}

/// List runs with filters, newest first.
#[utoipa::path(
    get,
    path = "/api/runs",
    responses((status = 200, description = "Run listing")),
    tag = "Runs"
)]
#[instrument(skip(state))]
pub async fn list_runs(
    State(state): State<AppState>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<RunListing>, ApiError> {
    let listing = state.store.list_runs(&query.into_filter()).await?;
    Ok(Json(listing))
}

/// Run summary with per-client metrics.
#[utoipa::path(
    get,
    path = "/api/runs/{id}",
    responses(
        (status = 200, description = "Run summary"),
        (status = 404, description = "Unknown run id"),
    ),
    tag = "Runs"
)]
#[instrument(skip(state))]
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoricRun>, ApiError> {
    Ok(Json(state.store.get_run(&id).await?))
}

/// The full stored benchmark result.
#[utoipa::path(
    get,
    path = "/api/runs/{id}/report",
    responses(
        (status = 200, description = "Full benchmark result"),
        (status = 404, description = "Unknown run id"),
    ),
    tag = "Runs"
)]
#[instrument(skip(state))]
pub async fn get_run_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BenchmarkResult>, ApiError> {
    let run = state.store.get_run(&id).await?;
    let result = run
        .full_result
        .ok_or_else(|| ApiError::Internal(format!("run {id} has no stored result blob")))?;
    Ok(Json(result))
}

/// Method metrics breakdown per client.
#[utoipa::path(
    get,
    path = "/api/runs/{id}/methods",
    responses(
        (status = 200, description = "Method breakdown"),
        (status = 404, description = "Unknown run id"),
    ),
    tag = "Runs"
)]
#[instrument(skip(state))]
pub async fn get_run_methods(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MethodBreakdownResponse>, ApiError> {
    let run = state.store.get_run(&id).await?;
    let result = run
        .full_result
        .ok_or_else(|| ApiError::Internal(format!("run {id} has no stored result blob")))?;

    let clients: HashMap<String, HashMap<String, benchwatch_types::MethodMetrics>> = result
        .client_metrics
        .into_iter()
        .map(|(client, metrics)| (client, metrics.methods))
        .collect();

    Ok(Json(MethodBreakdownResponse { run_id: id, clients }))
}

/// Regression report for a run. Stored regressions are preferred; with
/// none stored, a sequential detection runs on the fly (not persisted).
#[utoipa::path(
    get,
    path = "/api/runs/{id}/regressions",
    responses(
        (status = 200, description = "Regression report"),
        (status = 404, description = "Unknown run id"),
    ),
    tag = "Runs"
)]
#[instrument(skip(state))]
pub async fn get_run_regressions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RegressionReport>, ApiError> {
    let stored = state.detector.get_regressions(&id).await?;
    let regressions: Vec<Regression> = if stored.is_empty() {
        state
            .detector
            .detect_sequential(
                &id,
                1,
                &RegressionThresholds::default(),
                &DetectionFilter::default(),
            )
            .await?
    } else {
        stored
    };
    Ok(Json(benchwatch_core::regression::build_report(
        &id,
        regressions,
    )))
}

/// Acknowledge a stored regression.
#[utoipa::path(
    post,
    path = "/api/regressions/{id}/acknowledge",
    responses(
        (status = 200, description = "Regression acknowledged"),
        (status = 404, description = "Unknown regression id"),
    ),
    tag = "Runs"
)]
#[instrument(skip(state, request))]
pub async fn acknowledge_regression(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AcknowledgeRequest>,
) -> Result<Json<Regression>, ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let regression = state
        .detector
        .acknowledge_regression(&id, &request.user)
        .await?;
    Ok(Json(regression))
}
