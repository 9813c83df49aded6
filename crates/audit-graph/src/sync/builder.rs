//! Projection builder.
//!
//! Upserts one node per authoritative row and merges the structural edges the
//! row owns. Entity kinds touch disjoint labels and are built concurrently;
//! inside a page, up to `workers` entities are in flight at once.

use futures::stream::{self, StreamExt};
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::error::{EntityFailure, SyncError};
use crate::model::{EdgeSide, EntityKind, Scope};

use super::reader::{EdgeRef, EntityReader, EntityRecord};
use super::{StageSummary, SyncContext};

/// Outcome of projecting a single entity.
#[derive(Debug, Default)]
struct EntityOutcome {
    edges_created: usize,
    integrity_alerts: usize,
}

/// Build every entity kind in `scope`.
pub async fn build(ctx: &SyncContext, scope: Scope) -> StageSummary {
    let kinds = scope.kinds();
    info!(scope = %scope, kinds = kinds.len(), "Building projection");

    let results = join_all(kinds.into_iter().map(|kind| build_kind(ctx, kind))).await;

    let mut summary = StageSummary::default();
    for result in results {
        summary.merge(result);
    }

    info!(
        upserted = summary.upserted,
        edges_created = summary.edges_created,
        integrity_alerts = summary.integrity_alerts,
        failures = summary.failures.len(),
        "Projection build complete"
    );
    summary
}

/// Build all rows of one kind, page by page.
pub async fn build_kind(ctx: &SyncContext, kind: EntityKind) -> StageSummary {
    let reader = EntityReader::new(ctx.db.clone());
    let batch_size = ctx.batch_size_for(kind);
    let mut summary = StageSummary::default();
    let mut offset = 0;

    loop {
        let page = match ctx
            .retry
            .run_db("read page", || reader.page(kind, batch_size, offset))
            .await
        {
            Ok(page) => page,
            Err(err) => {
                warn!(kind = %kind, offset, error = %err, "Failed to read page, abandoning kind");
                summary.fail(EntityFailure::new(kind, format!("page@{offset}"), &err));
                break;
            }
        };
        let page_len = page.len();
        if page_len == 0 {
            break;
        }

        let outcomes: Vec<_> = stream::iter(page)
            .map(|record| async move {
                let id = record.id.clone();
                (id, build_entity(ctx, &record).await)
            })
            .buffer_unordered(ctx.workers)
            .collect()
            .await;

        for (id, outcome) in outcomes {
            match outcome {
                Ok(outcome) => {
                    summary.upserted += 1;
                    summary.edges_created += outcome.edges_created;
                    summary.integrity_alerts += outcome.integrity_alerts;
                }
                Err(err) => {
                    warn!(kind = %kind, id = %id, error = %err, "Skipping entity");
                    summary.fail(EntityFailure::new(kind, id, &err));
                }
            }
        }

        debug!(kind = %kind, offset, count = page_len, "Built page");
        if page_len < batch_size {
            break;
        }
        offset += batch_size;
    }

    info!(kind = %kind, upserted = summary.upserted, failures = summary.failures.len(), "Built kind");
    summary
}

/// Upsert one entity and merge its edges. Any failure skips the rest of it.
async fn build_entity(ctx: &SyncContext, record: &EntityRecord) -> Result<EntityOutcome, SyncError> {
    record.validate()?;

    let graph = &ctx.graph;
    ctx.retry
        .run("upsert node", || graph.upsert_node(record.kind, &record.id, &record.attrs))
        .await?;

    let mut outcome = EntityOutcome::default();
    for edge in &record.edges {
        if check_single_edge(ctx, edge).await? {
            outcome.integrity_alerts += 1;
        }

        let created = ctx
            .retry
            .run("merge edge", || graph.merge_edge(edge.edge, &edge.from, &edge.to))
            .await?;
        if created {
            outcome.edges_created += 1;
        }
    }

    debug!(kind = %record.kind, id = %record.id, edges = record.edges.len(), "Projected entity");
    Ok(outcome)
}

/// Look for an existing edge of a single-cardinality kind that points at a
/// different endpoint. Such a conflict is logged, not resolved here; the
/// authoritative edge is still merged and the repairer removes the other one.
async fn check_single_edge(ctx: &SyncContext, edge: &EdgeRef) -> Result<bool, SyncError> {
    let Some(side) = edge.edge.required_side() else {
        return Ok(false);
    };
    let graph = &ctx.graph;
    let (node, expected, existing) = match side {
        EdgeSide::Outgoing => {
            let existing = ctx
                .retry
                .run("read edge targets", || graph.edge_targets(edge.edge, &edge.from))
                .await?;
            (&edge.from, &edge.to, existing)
        }
        EdgeSide::Incoming => {
            let existing = ctx
                .retry
                .run("read edge sources", || graph.edge_sources(edge.edge, &edge.to))
                .await?;
            (&edge.to, &edge.from, existing)
        }
    };

    let conflicting: Vec<&String> = existing.iter().filter(|other| *other != expected).collect();
    if conflicting.is_empty() {
        return Ok(false);
    }
    error!(
        target: "integrity",
        edge = %edge.edge,
        node = %node,
        expected = %expected,
        conflicting = ?conflicting,
        "Edge cardinality exceeded; leaving for the repairer"
    );
    Ok(true)
}
