//! Route handlers.

pub mod coverage;
pub mod drift;
pub mod runs;

use std::fmt::Display;

use axum::http::StatusCode;
use tracing::warn;

use audit_graph::{Scope, SyncError};

/// Handler error: status plus plain-text message.
pub type ApiError = (StatusCode, String);

/// The graph store could not answer.
pub(crate) fn unavailable(err: impl Display) -> ApiError {
    warn!(error = %err, "Graph store unavailable");
    (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
}

pub(crate) fn sync_error(err: SyncError) -> ApiError {
    match err {
        SyncError::Transient { .. } | SyncError::Db(_) => unavailable(err),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

pub(crate) fn parse_scope(raw: Option<&str>) -> Result<Scope, ApiError> {
    raw.unwrap_or("all")
        .parse()
        .map_err(|e: String| (StatusCode::BAD_REQUEST, e))
}
