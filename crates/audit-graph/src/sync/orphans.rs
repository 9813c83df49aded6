//! Orphan repair: relationship-level drift.
//!
//! Runs after garbage collection. Hydrates key-only nodes, restores missing
//! required edges from authoritative rows, removes required edges that point
//! at the wrong endpoint and prunes any edge with no backing pair.
//! Nodes whose row is gone are flagged for the collector, never deleted here.

use std::collections::BTreeSet;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::error::{EntityFailure, SyncError};
use crate::model::{EdgeKind, EdgeSide, EntityKind, Scope, REQUIRED_EDGES};

use super::reader::EntityReader;
use super::{NodeRef, StageSummary, SyncContext};

/// Repair every kind in `scope`.
pub async fn repair(ctx: &SyncContext, scope: Scope) -> StageSummary {
    let kinds = scope.kinds();
    let mut summary = StageSummary::default();

    for kind in &kinds {
        summary.merge(hydrate(ctx, *kind).await);
    }

    for (edge, side) in REQUIRED_EDGES {
        if kinds.contains(&node_kind(*edge, *side)) {
            summary.merge(repair_required(ctx, *edge, *side).await);
        }
    }

    // Required edges too: a degree-1 edge whose column went null or moved
    // has no backing pair and is invisible to the degree check above.
    for edge in EdgeKind::ALL {
        if kinds.iter().any(|k| edge.touches(*k)) {
            summary.merge(prune_stale_edges(ctx, edge).await);
        }
    }

    info!(
        scope = %scope,
        hydrated = summary.hydrated,
        edges_repaired = summary.edges_repaired,
        edges_removed = summary.edges_removed,
        irreparable = summary.irreparable.len(),
        "Orphan repair complete"
    );
    summary
}

fn node_kind(edge: EdgeKind, side: EdgeSide) -> EntityKind {
    match side {
        EdgeSide::Outgoing => edge.from_kind(),
        EdgeSide::Incoming => edge.to_kind(),
    }
}

/// Orient `(node, other)` as the edge's `(from, to)`.
fn oriented<'a>(side: EdgeSide, node: &'a str, other: &'a str) -> (&'a str, &'a str) {
    match side {
        EdgeSide::Outgoing => (node, other),
        EdgeSide::Incoming => (other, node),
    }
}

/// Give key-only nodes their attributes, or flag them when the row is gone.
pub async fn hydrate(ctx: &SyncContext, kind: EntityKind) -> StageSummary {
    let reader = EntityReader::new(ctx.db.clone());
    let graph = &ctx.graph;
    let mut summary = StageSummary::default();

    let keys = match ctx
        .retry
        .run("list unhydrated nodes", || graph.unhydrated_keys(kind))
        .await
    {
        Ok(keys) => keys,
        Err(err) => {
            summary.fail(EntityFailure::new(kind, "*", &err));
            return summary;
        }
    };

    for key in keys {
        let record = match ctx.retry.run_db("read row", || reader.get(kind, &key)).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(kind = %kind, id = %key, "Partial node has no authoritative row");
                summary.irreparable.push(NodeRef::new(kind, key));
                continue;
            }
            Err(err) => {
                summary.fail(EntityFailure::new(kind, key, &err));
                continue;
            }
        };

        match ctx
            .retry
            .run("hydrate node", || graph.upsert_node(kind, &key, &record.attrs))
            .await
        {
            Ok(()) => {
                debug!(kind = %kind, id = %key, "Hydrated partial node");
                summary.hydrated += 1;
            }
            Err(err) => summary.fail(EntityFailure::new(kind, key, &err)),
        }
    }
    summary
}

/// Enforce exactly one `edge` per node on `side`.
pub async fn repair_required(ctx: &SyncContext, edge: EdgeKind, side: EdgeSide) -> StageSummary {
    let reader = EntityReader::new(ctx.db.clone());
    let graph = &ctx.graph;
    let kind = node_kind(edge, side);
    let mut summary = StageSummary::default();

    let degrees = match ctx
        .retry
        .run("count edge degrees", || graph.edge_degrees(edge, side))
        .await
    {
        Ok(degrees) => degrees,
        Err(err) => {
            summary.fail(EntityFailure::new(kind, "*", &err));
            return summary;
        }
    };

    for (key, degree) in degrees {
        if degree == 1 {
            continue;
        }
        if let Err(err) = repair_node(ctx, &reader, edge, side, &key, degree, &mut summary).await {
            warn!(edge = %edge, id = %key, error = %err, "Failed to repair edge");
            summary.fail(EntityFailure::new(kind, key, &err));
        }
    }
    summary
}

async fn repair_node(
    ctx: &SyncContext,
    reader: &EntityReader,
    edge: EdgeKind,
    side: EdgeSide,
    key: &str,
    degree: usize,
    summary: &mut StageSummary,
) -> Result<(), SyncError> {
    let kind = node_kind(edge, side);
    let graph = &ctx.graph;

    let Some(record) = ctx.retry.run_db("read row", || reader.get(kind, key)).await? else {
        warn!(kind = %kind, id = %key, edge = %edge, "Orphan has no authoritative row");
        summary.irreparable.push(NodeRef::new(kind, key));
        return Ok(());
    };
    let expected = record.endpoint(edge);

    if degree == 0 {
        let Some(other) = expected else {
            // The row exists but the relation column is null.
            return record.validate();
        };
        let (from, to) = oriented(side, key, other);
        ctx.retry
            .run("recreate edge", || graph.merge_edge(edge, from, to))
            .await?;
        info!(edge = %edge, from = %from, to = %to, "Recreated missing edge");
        summary.edges_repaired += 1;
        return Ok(());
    }

    error!(target: "integrity", edge = %edge, id = %key, degree, "Node has more than one required edge");
    summary.integrity_alerts += 1;

    let current = match side {
        EdgeSide::Outgoing => ctx.retry.run("read edge targets", || graph.edge_targets(edge, key)).await?,
        EdgeSide::Incoming => ctx.retry.run("read edge sources", || graph.edge_sources(edge, key)).await?,
    };
    for other in current.iter().filter(|o| Some(o.as_str()) != expected) {
        let (from, to) = oriented(side, key, other);
        if ctx
            .retry
            .run("delete excess edge", || graph.delete_edge(edge, from, to))
            .await?
        {
            info!(edge = %edge, from = %from, to = %to, "Removed excess edge");
            summary.edges_removed += 1;
        }
    }

    if let Some(other) = expected {
        if !current.iter().any(|o| o == other) {
            let (from, to) = oriented(side, key, other);
            ctx.retry
                .run("recreate edge", || graph.merge_edge(edge, from, to))
                .await?;
            summary.edges_repaired += 1;
        }
    }
    Ok(())
}

/// Remove edges of one kind that no authoritative pair backs.
///
/// Graph pairs are read before authoritative pairs, as in garbage
/// collection, and every candidate is re-checked before it is deleted.
pub async fn prune_stale_edges(ctx: &SyncContext, edge: EdgeKind) -> StageSummary {
    let reader = EntityReader::new(ctx.db.clone());
    let graph = &ctx.graph;
    let mut summary = StageSummary::default();

    let snapshot = async {
        let graph_pairs: BTreeSet<(String, String)> = ctx
            .retry
            .run("snapshot edges", || graph.edge_pairs(edge))
            .await?
            .into_iter()
            .collect();
        let authoritative = ctx
            .retry
            .run_db("read pairs", || reader.edge_pairs(edge))
            .await?;
        Ok::<_, SyncError>(
            graph_pairs
                .difference(&authoritative)
                .cloned()
                .collect::<Vec<_>>(),
        )
    };
    let stale = match snapshot.await {
        Ok(stale) => stale,
        Err(err) => {
            summary.fail(EntityFailure::new(edge.owner(), "*", &err));
            return summary;
        }
    };

    if stale.is_empty() {
        return summary;
    }
    let recheck = match ctx.retry.run_db("recheck pairs", || reader.edge_pairs(edge)).await {
        Ok(pairs) => pairs,
        Err(err) => {
            summary.fail(EntityFailure::new(edge.owner(), "*", &err));
            return summary;
        }
    };

    for (from, to) in stale {
        if recheck.contains(&(from.clone(), to.clone())) {
            continue;
        }
        match ctx
            .retry
            .run("delete stale edge", || graph.delete_edge(edge, &from, &to))
            .await
        {
            Ok(true) => {
                debug!(edge = %edge, from = %from, to = %to, "Removed stale edge");
                summary.edges_removed += 1;
            }
            Ok(false) => {}
            Err(err) => summary.fail(EntityFailure::new(edge.owner(), from, &err)),
        }
    }
    summary
}

/// Delete every edge of one kind and recreate it from authoritative pairs.
///
/// Queries running meanwhile may see the relationship missing; callers must
/// request this explicitly.
pub async fn rebuild_edges(ctx: &SyncContext, edge: EdgeKind) -> StageSummary {
    let reader = EntityReader::new(ctx.db.clone());
    let graph = &ctx.graph;
    let mut summary = StageSummary::default();

    let pairs = match ctx.retry.run_db("read pairs", || reader.edge_pairs(edge)).await {
        Ok(pairs) => pairs,
        Err(err) => {
            summary.fail(EntityFailure::new(edge.owner(), "*", &err));
            return summary;
        }
    };

    warn!(edge = %edge, pairs = pairs.len(), "Rebuilding relationship from scratch");
    match ctx
        .retry
        .run("delete all edges", || graph.delete_all_edges(edge))
        .await
    {
        Ok(removed) => summary.edges_removed += removed,
        Err(err) => {
            summary.fail(EntityFailure::new(edge.owner(), "*", &err));
            return summary;
        }
    }

    let results: Vec<_> = stream::iter(pairs)
        .map(|(from, to)| async move {
            let created = ctx
                .retry
                .run("merge edge", || graph.merge_edge(edge, &from, &to))
                .await;
            (from, created)
        })
        .buffer_unordered(ctx.workers)
        .collect()
        .await;

    for (from, created) in results {
        match created {
            Ok(true) => summary.edges_created += 1,
            Ok(false) => {}
            Err(err) => summary.fail(EntityFailure::new(edge.owner(), from, &err)),
        }
    }

    info!(
        edge = %edge,
        removed = summary.edges_removed,
        created = summary.edges_created,
        failures = summary.failures.len(),
        "Relationship rebuilt"
    );
    summary
}
