//! Synchronizer error taxonomy.

use serde::Serialize;
use thiserror::Error;

use crate::model::EntityKind;

/// Errors raised by the synchronization stages.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Store I/O failure or per-operation timeout. Retried at the single
    /// operation level.
    #[error("transient store error during {operation}: {source}")]
    Transient {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// An authoritative row lacks a field the projection requires.
    #[error("{kind} {id}: missing required field '{field}'")]
    Data {
        kind: EntityKind,
        id: String,
        field: &'static str,
    },

    /// A projection invariant is violated. Logged and left for the repairer.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// Unusable configuration or unreachable store at startup.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("relational store error: {0}")]
    Db(#[from] audit_db::DbError),

    #[error("reconciliation cancelled")]
    Cancelled,
}

impl SyncError {
    pub fn class(&self) -> FailureClass {
        match self {
            SyncError::Transient { .. } => FailureClass::Transient,
            SyncError::Data { .. } => FailureClass::Data,
            SyncError::Integrity(_) => FailureClass::Integrity,
            SyncError::Config(_) => FailureClass::Config,
            SyncError::Db(_) => FailureClass::Transient,
            SyncError::Cancelled => FailureClass::Cancelled,
        }
    }
}

/// Coarse failure category carried in run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Transient,
    Data,
    Integrity,
    Config,
    Cancelled,
}

/// One entity that a stage could not process.
#[derive(Debug, Clone, Serialize)]
pub struct EntityFailure {
    pub kind: Option<EntityKind>,
    pub id: String,
    pub class: FailureClass,
    pub message: String,
}

impl EntityFailure {
    pub fn new(kind: EntityKind, id: impl Into<String>, err: &SyncError) -> Self {
        Self::build(Some(kind), id.into(), err)
    }

    /// A failure not tied to a graph entity, such as a project-control row.
    pub fn unscoped(id: impl Into<String>, err: &SyncError) -> Self {
        Self::build(None, id.into(), err)
    }

    fn build(kind: Option<EntityKind>, id: String, err: &SyncError) -> Self {
        Self {
            kind,
            id,
            class: err.class(),
            message: err.to_string(),
        }
    }
}
