//! Coverage queries.
//!
//! A control is covered when some evidence shares a tag name with it after
//! case folding; with a user given, only evidence that user uploaded counts.
//! Matches are recomputed from the current projection on every call.

use std::collections::BTreeSet;

use anyhow::Result;
use serde::Serialize;

use crate::store::{EvidenceTags, GraphStore};
use crate::sync::tag_links::{shares_tag, tag_set};

/// Coverage of one control.
#[derive(Debug, Clone, Serialize)]
pub struct ControlCoverage {
    pub control_id: String,
    pub code: Option<String>,
    pub title: Option<String>,
    pub tags: Vec<String>,
    /// Has at least one tag, so evidence can cover it.
    pub eligible: bool,
    /// Evidence from any uploader sharing a tag.
    pub evidence_total: usize,
    /// Evidence from the scoping user sharing a tag (all evidence when unscoped).
    pub evidence_in_scope: usize,
    pub covered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageSummary {
    pub standard_id: String,
    pub user_id: Option<String>,
    pub covered: usize,
    pub total: usize,
}

/// Coverage of one standard for one user.
#[derive(Debug, Clone, Serialize)]
pub struct StandardProjection {
    pub standard_id: String,
    pub name: String,
    pub covered: usize,
    pub total: usize,
    /// Rounded to the nearest whole percent; 0 for an empty standard.
    pub percentage: u32,
}

fn folded(evidence: Vec<EvidenceTags>) -> Vec<BTreeSet<String>> {
    evidence.into_iter().map(|e| tag_set(&e.tags)).collect()
}

/// Per-control coverage for a standard.
///
/// An unknown standard or one without controls yields an empty list; a user
/// without uploads yields zero coverage.
pub async fn control_coverage(
    graph: &dyn GraphStore,
    standard_id: &str,
    user_id: Option<&str>,
) -> Result<Vec<ControlCoverage>> {
    let controls = graph.controls_of_standard(standard_id).await?;
    if controls.is_empty() {
        return Ok(Vec::new());
    }

    let all = folded(graph.evidence_tags(None).await?);
    let scoped = match user_id {
        Some(user) => folded(graph.evidence_tags(Some(user)).await?),
        None => all.clone(),
    };

    Ok(controls
        .into_iter()
        .map(|control| {
            let tags = tag_set(&control.tags);
            let evidence_total = all.iter().filter(|e| shares_tag(&tags, e)).count();
            let evidence_in_scope = scoped.iter().filter(|e| shares_tag(&tags, e)).count();
            ControlCoverage {
                eligible: !tags.is_empty(),
                control_id: control.id,
                code: control.code,
                title: control.title,
                tags: control.tags,
                evidence_total,
                evidence_in_scope,
                covered: evidence_in_scope > 0,
            }
        })
        .collect())
}

/// `(covered, total)` controls of a standard.
pub async fn coverage_summary(
    graph: &dyn GraphStore,
    standard_id: &str,
    user_id: Option<&str>,
) -> Result<CoverageSummary> {
    let controls = control_coverage(graph, standard_id, user_id).await?;
    Ok(CoverageSummary {
        standard_id: standard_id.to_string(),
        user_id: user_id.map(str::to_string),
        covered: controls.iter().filter(|c| c.covered).count(),
        total: controls.len(),
    })
}

/// Coverage of every standard for one user, most covered first.
pub async fn projection(graph: &dyn GraphStore, user_id: &str) -> Result<Vec<StandardProjection>> {
    let standards = graph.standards().await?;
    let mut rows = Vec::with_capacity(standards.len());

    for (standard_id, name) in standards {
        let summary = coverage_summary(graph, &standard_id, Some(user_id)).await?;
        let percentage = if summary.total == 0 {
            0
        } else {
            ((summary.covered as f64 / summary.total as f64) * 100.0).round() as u32
        };
        rows.push(StandardProjection {
            standard_id,
            name,
            covered: summary.covered,
            total: summary.total,
            percentage,
        });
    }

    rows.sort_by(|a, b| {
        b.covered
            .cmp(&a.covered)
            .then_with(|| a.standard_id.cmp(&b.standard_id))
    });
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraph;
    use crate::model::{EdgeKind, EntityKind};
    use crate::store::NodeAttrs;

    async fn tag(graph: &MemoryGraph, id: &str, name: &str) {
        let attrs = NodeAttrs::from([("name".to_string(), name.to_string())]);
        graph.upsert_node(EntityKind::Tag, id, &attrs).await.unwrap();
    }

    #[tokio::test]
    async fn empty_standard_is_zero_of_zero() {
        let graph = MemoryGraph::new();
        graph
            .upsert_node(EntityKind::Framework, "f-empty", &NodeAttrs::new())
            .await
            .unwrap();

        let summary = coverage_summary(&graph, "f-empty", Some("u1")).await.unwrap();
        assert_eq!((summary.covered, summary.total), (0, 0));
    }

    #[tokio::test]
    async fn projection_orders_by_covered_and_rounds() {
        let graph = MemoryGraph::new();
        tag(&graph, "t1", "Policy").await;
        for (control, standard) in [("c1", "f1"), ("c2", "f1"), ("c3", "f1"), ("c4", "f2")] {
            graph.merge_edge(EdgeKind::ControlStandard, control, standard).await.unwrap();
        }
        graph.merge_edge(EdgeKind::ControlTag, "c1", "t1").await.unwrap();
        graph.merge_edge(EdgeKind::ControlTag, "c4", "t1").await.unwrap();
        graph.merge_edge(EdgeKind::EvidenceTag, "e1", "t1").await.unwrap();
        graph.merge_edge(EdgeKind::UserEvidence, "u1", "e1").await.unwrap();

        let rows = projection(&graph, "u1").await.unwrap();
        assert_eq!(rows.len(), 2);
        // Both cover one control; ties fall back to the standard key.
        assert_eq!(rows[0].standard_id, "f1");
        assert_eq!(rows[0].percentage, 33);
        assert_eq!(rows[1].percentage, 100);
    }

    #[tokio::test]
    async fn untagged_controls_are_not_eligible() {
        let graph = MemoryGraph::new();
        graph.merge_edge(EdgeKind::ControlStandard, "c1", "f1").await.unwrap();
        graph.upsert_node(EntityKind::Evidence, "e1", &NodeAttrs::new()).await.unwrap();

        let rows = control_coverage(&graph, "f1", None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].eligible);
        assert!(!rows[0].covered);
        assert_eq!(rows[0].evidence_total, 0);
    }
}
