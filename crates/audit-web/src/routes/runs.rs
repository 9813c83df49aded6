//! Reconciliation run handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use audit_graph::{RunRecord, Trigger, TriggerOutcome};

use super::{parse_scope, ApiError};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ReconcileRequest {
    #[serde(default)]
    pub scope: Option<String>,
}

/// Start an on-demand run. Collisions with an active run are reported, not queued.
pub async fn reconcile(
    State(state): State<AppState>,
    Json(req): Json<ReconcileRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let scope = parse_scope(req.scope.as_deref())?;

    match state.reconciler.trigger(scope, Trigger::OnDemand) {
        TriggerOutcome::Started(run_id) => {
            info!(run_id = %run_id, scope = %scope, "Reconciliation requested");
            Ok((
                StatusCode::ACCEPTED,
                Json(json!({ "run_id": run_id, "scope": scope })),
            ))
        }
        TriggerOutcome::Dropped { active } => Ok((
            StatusCode::CONFLICT,
            Json(json!({ "active_run_id": active, "scope": scope })),
        )),
    }
}

pub async fn list_runs(State(state): State<AppState>) -> Json<Vec<RunRecord>> {
    Json(state.reconciler.runs())
}

pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RunRecord>, ApiError> {
    let id = Uuid::parse_str(&id)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid run id: {e}")))?;

    state
        .reconciler
        .get(id)
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("run {id} not found")))
}
