//! Relational to graph projection pipeline.
//!
//! Stages run in a fixed order (build, counter healing, garbage collection,
//! orphan repair). Each is idempotent and reports a [`StageSummary`]; the
//! [`scheduler`] chains them into reconciliation runs.

pub mod builder;
pub mod drift;
pub mod gc;
pub mod orphans;
pub mod reader;
pub mod scheduler;
pub mod tag_links;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use audit_db::DbPool;

use crate::config::SyncConfig;
use crate::error::EntityFailure;
use crate::model::EntityKind;
use crate::retry::RetryPolicy;
use crate::store::GraphStore;

/// Store handles and tuning shared by every stage.
#[derive(Clone)]
pub struct SyncContext {
    pub db: DbPool,
    pub graph: Arc<dyn GraphStore>,
    pub retry: RetryPolicy,
    pub workers: usize,
    pub batch_size: usize,
    pub batch_sizes: HashMap<EntityKind, usize>,
}

impl SyncContext {
    /// Context with default tuning.
    pub fn new(db: DbPool, graph: Arc<dyn GraphStore>) -> Self {
        Self::from_config(&SyncConfig::default(), db, graph)
    }

    pub fn from_config(config: &SyncConfig, db: DbPool, graph: Arc<dyn GraphStore>) -> Self {
        Self {
            db,
            graph,
            retry: config.retry_policy(),
            workers: config.workers.max(1),
            batch_size: config.batch_size.max(1),
            batch_sizes: config.batch_sizes.clone(),
        }
    }

    pub fn batch_size_for(&self, kind: EntityKind) -> usize {
        self.batch_sizes
            .get(&kind)
            .copied()
            .unwrap_or(self.batch_size)
            .max(1)
    }
}

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Build,
    HealCounters,
    Collect,
    Repair,
}

impl Stage {
    pub const ORDER: [Stage; 4] = [Stage::Build, Stage::HealCounters, Stage::Collect, Stage::Repair];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Build => "build",
            Stage::HealCounters => "heal-counters",
            Stage::Collect => "gc",
            Stage::Repair => "repair",
        };
        f.write_str(name)
    }
}

/// Node reference used in reports.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct NodeRef {
    pub kind: EntityKind,
    pub id: String,
}

impl NodeRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }
}

/// Result of one stage, or of a whole run once merged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageSummary {
    /// Nodes upserted from authoritative rows.
    pub upserted: usize,
    /// Edges that did not exist before a merge.
    pub edges_created: usize,
    /// Stale nodes removed, per entity kind.
    pub deleted: BTreeMap<EntityKind, Vec<String>>,
    /// Key-only nodes given their attributes.
    pub hydrated: usize,
    /// Missing required edges recreated.
    pub edges_repaired: usize,
    /// Excess or stale edges removed.
    pub edges_removed: usize,
    pub counters_healed: usize,
    pub integrity_alerts: usize,
    /// Nodes whose authoritative row is gone; left for the collector.
    pub irreparable: Vec<NodeRef>,
    pub failures: Vec<EntityFailure>,
}

impl StageSummary {
    pub fn merge(&mut self, other: StageSummary) {
        self.upserted += other.upserted;
        self.edges_created += other.edges_created;
        for (kind, ids) in other.deleted {
            self.deleted.entry(kind).or_default().extend(ids);
        }
        self.hydrated += other.hydrated;
        self.edges_repaired += other.edges_repaired;
        self.edges_removed += other.edges_removed;
        self.counters_healed += other.counters_healed;
        self.integrity_alerts += other.integrity_alerts;
        self.irreparable.extend(other.irreparable);
        self.failures.extend(other.failures);
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted.values().map(Vec::len).sum()
    }

    pub fn record_deleted(&mut self, kind: EntityKind, id: impl Into<String>) {
        self.deleted.entry(kind).or_default().push(id.into());
    }

    pub fn fail(&mut self, failure: EntityFailure) {
        self.failures.push(failure);
    }
}
