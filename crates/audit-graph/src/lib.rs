//! # Audit Graph
//!
//! Neo4j projection of the audit store.
//!
//! Mirrors frameworks, controls, tags, evidence, projects and users into a
//! graph, keeps the projection reconciled with the relational store, and
//! answers tag-based coverage queries over it.

pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod model;
pub mod neo4j;
pub mod queries;
pub mod retry;
pub mod schema;
pub mod store;
pub mod sync;

pub use client::{GraphClient, GraphConfig};
pub use config::SyncConfig;
pub use error::{EntityFailure, FailureClass, SyncError};
pub use memory::MemoryGraph;
pub use model::{EdgeKind, EntityKind, Scope};
pub use neo4j::Neo4jStore;
pub use retry::RetryPolicy;
pub use store::{GraphCounts, GraphStore};
pub use sync::scheduler::{Reconciler, RunId, RunRecord, RunState, Trigger, TriggerOutcome};
pub use sync::{StageSummary, SyncContext};
