//! Read-only drift measurement.
//!
//! Compares the projection with the authoritative store without writing to
//! either. Used by `verify` and the drift endpoint.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::info;

use crate::error::SyncError;
use crate::model::{EdgeKind, EntityKind, Scope};

use super::reader::EntityReader;
use super::SyncContext;

#[derive(Debug, Clone, Serialize)]
pub struct NodeDrift {
    pub kind: EntityKind,
    /// Rows without a node.
    pub missing: Vec<String>,
    /// Nodes without a row.
    pub stale: Vec<String>,
    /// Key-only nodes.
    pub unhydrated: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeDrift {
    pub edge: EdgeKind,
    /// Authoritative pairs with no edge.
    pub missing: Vec<(String, String)>,
    /// Edges with no authoritative pair.
    pub excess: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CounterDrift {
    pub project_control_id: String,
    pub stored: i64,
    pub actual: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DriftReport {
    pub nodes: Vec<NodeDrift>,
    pub edges: Vec<EdgeDrift>,
    pub counters: Vec<CounterDrift>,
}

impl DriftReport {
    /// Number of individual discrepancies.
    pub fn total(&self) -> usize {
        let nodes: usize = self
            .nodes
            .iter()
            .map(|n| n.missing.len() + n.stale.len() + n.unhydrated.len())
            .sum();
        let edges: usize = self
            .edges
            .iter()
            .map(|e| e.missing.len() + e.excess.len())
            .sum();
        nodes + edges + self.counters.len()
    }

    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }
}

fn sorted_difference<T: Ord + Clone>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> Vec<T> {
    a.difference(b).cloned().collect()
}

/// Measure drift for every kind, edge and counter in `scope`.
pub async fn measure_drift(ctx: &SyncContext, scope: Scope) -> Result<DriftReport, SyncError> {
    let reader = EntityReader::new(ctx.db.clone());
    let graph = &ctx.graph;
    let kinds = scope.kinds();
    let mut report = DriftReport::default();

    for kind in &kinds {
        let kind = *kind;
        let graph_keys = ctx.retry.run("snapshot node keys", || graph.node_keys(kind)).await?;
        let unhydrated = ctx
            .retry
            .run("list unhydrated nodes", || graph.unhydrated_keys(kind))
            .await?;
        let authoritative = ctx.retry.run_db("read ids", || reader.ids(kind)).await?;

        report.nodes.push(NodeDrift {
            kind,
            missing: sorted_difference(&authoritative, &graph_keys),
            stale: sorted_difference(&graph_keys, &authoritative),
            unhydrated,
        });
    }

    for edge in EdgeKind::ALL {
        if !kinds.iter().any(|k| edge.touches(*k)) {
            continue;
        }
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

        report.edges.push(EdgeDrift {
            edge,
            missing: sorted_difference(&authoritative, &graph_pairs),
            excess: sorted_difference(&graph_pairs, &authoritative),
        });
    }

    if scope.heals_counters() {
        let mut offset = 0;
        loop {
            let page = ctx
                .retry
                .run_db("read project controls", || {
                    reader.project_controls(ctx.batch_size, offset)
                })
                .await?;
            let page_len = page.len();
            for pc in page {
                let actual = ctx
                    .retry
                    .run_db("count links", || reader.linked_evidence_count(&pc.id))
                    .await?;
                if actual != pc.evidence_count {
                    report.counters.push(CounterDrift {
                        project_control_id: pc.id,
                        stored: pc.evidence_count,
                        actual,
                    });
                }
            }
            if page_len < ctx.batch_size {
                break;
            }
            offset += ctx.batch_size;
        }
    }

    info!(scope = %scope, discrepancies = report.total(), "Drift measured");
    Ok(report)
}
