//! Drift report handler.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use audit_graph::sync::drift::{measure_drift, DriftReport};

use super::{parse_scope, sync_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DriftParams {
    pub scope: Option<String>,
}

/// Compare both stores without writing to either.
pub async fn drift(
    State(state): State<AppState>,
    Query(params): Query<DriftParams>,
) -> Result<Json<DriftReport>, ApiError> {
    let scope = parse_scope(params.scope.as_deref())?;
    let report = measure_drift(state.context(), scope)
        .await
        .map_err(sync_error)?;
    Ok(Json(report))
}
