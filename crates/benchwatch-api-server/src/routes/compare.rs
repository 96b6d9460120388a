// ABOUTME: Pairwise run comparison: run1 is the reference, run2 the candidate

use crate::models::errors::ApiError;
use crate::models::requests::CompareQuery;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::response::Json;
use benchwatch_core::baseline::build_comparison;
use benchwatch_types::{BaselineComparison, BaselineMetrics};
use tracing::instrument;

/// Compare two runs of the same test.
#[utoipa::path(
    get,
    path = "/api/compare",
    responses(
        (status = 200, description = "Pairwise comparison"),
        (status = 400, description = "Runs belong to different tests"),
        (status = 404, description = "Unknown run id"),
    ),
    tag = "Compare"
)]
#[instrument(skip(state))]
pub async fn compare_runs(
    State(state): State<AppState>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<BaselineComparison>, ApiError> {
    let reference = state.store.get_run(&query.run1).await?;
    let candidate = state.store.get_run(&query.run2).await?;

    if reference.test_name != candidate.test_name {
        return Err(ApiError::Validation(format!(
            "cannot compare across tests: {} vs {}",
            reference.test_name, candidate.test_name
        )));
    }

    let reference_result = reference
        .full_result
        .as_ref()
        .ok_or_else(|| ApiError::Internal(format!("run {} has no stored result blob", reference.id)))?;
    let candidate_result = candidate
        .full_result
        .as_ref()
        .ok_or_else(|| ApiError::Internal(format!("run {} has no stored result blob", candidate.id)))?;

    let comparison = build_comparison(
        &candidate.id,
        &reference.id,
        &reference.test_name,
        &BaselineMetrics::from_result(reference_result),
        &BaselineMetrics::from_result(candidate_result),
    );
    Ok(Json(comparison))
}
