//! Garbage collection of stale projection nodes.
//!
//! This is the only stage that deletes nodes. A pass snapshots the graph keys
//! of one label first and the authoritative ids second; a node the builder
//! creates after the graph snapshot is never a candidate. Each candidate is
//! re-checked against the relational store right before its delete.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::error::{EntityFailure, SyncError};
use crate::model::{EntityKind, Scope};

use super::reader::EntityReader;
use super::{StageSummary, SyncContext};

/// Stale keys of one kind from a single pair of snapshots.
#[derive(Debug, Clone)]
pub struct GcPlan {
    pub kind: EntityKind,
    pub stale: BTreeSet<String>,
}

/// Collect every kind in `scope`.
pub async fn collect(ctx: &SyncContext, scope: Scope) -> StageSummary {
    let mut summary = StageSummary::default();
    for kind in scope.kinds() {
        summary.merge(collect_kind(ctx, kind).await);
    }
    info!(scope = %scope, deleted = summary.deleted_count(), "Garbage collection complete");
    summary
}

/// One snapshot-and-diff pass over a single label.
pub async fn collect_kind(ctx: &SyncContext, kind: EntityKind) -> StageSummary {
    match plan(ctx, kind).await {
        Ok(plan) => apply(ctx, &plan).await,
        Err(err) => {
            warn!(kind = %kind, error = %err, "Could not snapshot for garbage collection");
            let mut summary = StageSummary::default();
            summary.fail(EntityFailure::new(kind, "*", &err));
            summary
        }
    }
}

/// Snapshot both sides and compute `graph - authoritative`.
pub async fn plan(ctx: &SyncContext, kind: EntityKind) -> Result<GcPlan, SyncError> {
    let graph = &ctx.graph;
    let graph_keys = ctx
        .retry
        .run("snapshot node keys", || graph.node_keys(kind))
        .await?;
    let reader = EntityReader::new(ctx.db.clone());
    let authoritative = ctx.retry.run_db("read ids", || reader.ids(kind)).await?;

    let stale: BTreeSet<String> = graph_keys.difference(&authoritative).cloned().collect();
    debug!(
        kind = %kind,
        graph = graph_keys.len(),
        authoritative = authoritative.len(),
        stale = stale.len(),
        "Computed stale set"
    );
    Ok(GcPlan { kind, stale })
}

/// Delete the planned nodes whose row is still absent.
pub async fn apply(ctx: &SyncContext, plan: &GcPlan) -> StageSummary {
    let reader = EntityReader::new(ctx.db.clone());
    let graph = &ctx.graph;
    let kind = plan.kind;
    let mut summary = StageSummary::default();

    for id in &plan.stale {
        match ctx.retry.run_db("recheck row", || reader.exists(kind, id)).await {
            Ok(true) => {
                debug!(kind = %kind, id = %id, "Row reappeared, keeping node");
                continue;
            }
            Ok(false) => {}
            Err(err) => {
                summary.fail(EntityFailure::new(kind, id.as_str(), &err));
                continue;
            }
        }

        match ctx
            .retry
            .run("detach delete node", || graph.detach_delete_node(kind, id))
            .await
        {
            Ok(true) => {
                debug!(kind = %kind, id = %id, "Deleted stale node");
                summary.record_deleted(kind, id.as_str());
            }
            Ok(false) => debug!(kind = %kind, id = %id, "Stale node already gone"),
            Err(err) => {
                warn!(kind = %kind, id = %id, error = %err, "Failed to delete stale node");
                summary.fail(EntityFailure::new(kind, id.as_str(), &err));
            }
        }
    }

    if !plan.stale.is_empty() {
        info!(kind = %kind, stale = plan.stale.len(), deleted = summary.deleted_count(), "Collected stale nodes");
    }
    summary
}
