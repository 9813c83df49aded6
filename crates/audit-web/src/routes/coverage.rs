//! Coverage query handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use audit_graph::queries::{self, ControlCoverage, CoverageSummary, StandardProjection};

use super::{unavailable, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CoverageParams {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectionParams {
    pub user_id: String,
}

pub async fn control_coverage(
    State(state): State<AppState>,
    Path(standard_id): Path<String>,
    Query(params): Query<CoverageParams>,
) -> Result<Json<Vec<ControlCoverage>>, ApiError> {
    let controls =
        queries::control_coverage(state.graph().as_ref(), &standard_id, params.user_id.as_deref())
            .await
            .map_err(unavailable)?;
    Ok(Json(controls))
}

pub async fn coverage_summary(
    State(state): State<AppState>,
    Path(standard_id): Path<String>,
    Query(params): Query<CoverageParams>,
) -> Result<Json<CoverageSummary>, ApiError> {
    let summary =
        queries::coverage_summary(state.graph().as_ref(), &standard_id, params.user_id.as_deref())
            .await
            .map_err(unavailable)?;
    Ok(Json(summary))
}

/// Every standard's coverage for one user.
pub async fn projection(
    State(state): State<AppState>,
    Query(params): Query<ProjectionParams>,
) -> Result<Json<Vec<StandardProjection>>, ApiError> {
    let rows = queries::projection(state.graph().as_ref(), &params.user_id)
        .await
        .map_err(unavailable)?;
    Ok(Json(rows))
}
