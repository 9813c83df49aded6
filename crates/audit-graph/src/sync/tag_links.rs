//! Tag-link resolution and evidence counter healing.
//!
//! Two separate notions live here. Tag-derived coverage links evidence to a
//! control when they share a tag name after case folding; it is computed on
//! read and never stored. The `evidence_count` counter on a project control
//! counts explicit evidence links only and is healed against the relational
//! store.

use std::collections::BTreeSet;

use anyhow::Result;
use tracing::{debug, info, warn};

use audit_db::queries::project_controls::{self, ProjectControlRow};

use crate::error::{EntityFailure, SyncError};
use crate::model::EntityKind;
use crate::store::GraphStore;

use super::reader::EntityReader;
use super::{StageSummary, SyncContext};

/// Case-folded form used for tag comparison. No trimming or stemming.
pub fn fold_tag(name: &str) -> String {
    name.to_lowercase()
}

/// Folded tag-name set.
pub fn tag_set<S: AsRef<str>>(names: &[S]) -> BTreeSet<String> {
    names.iter().map(|n| fold_tag(n.as_ref())).collect()
}

/// Whether two folded tag sets intersect. Empty sets never match.
pub fn shares_tag(a: &BTreeSet<String>, b: &BTreeSet<String>) -> bool {
    !a.is_disjoint(b)
}

/// Evidence keys whose tags intersect the control's tags, optionally limited
/// to one uploader.
pub async fn coverage_set(
    graph: &dyn GraphStore,
    control_id: &str,
    uploader: Option<&str>,
) -> Result<Vec<String>> {
    let control_tags = tag_set(&graph.tag_names(EntityKind::Control, control_id).await?);
    if control_tags.is_empty() {
        return Ok(Vec::new());
    }

    let evidence = graph.evidence_tags(uploader).await?;
    Ok(evidence
        .into_iter()
        .filter(|e| shares_tag(&control_tags, &tag_set(&e.tags)))
        .map(|e| e.id)
        .collect())
}

/// Recompute every project control's `evidence_count` from explicit links and
/// write back only the ones that differ.
pub async fn heal_counters(ctx: &SyncContext) -> StageSummary {
    let reader = EntityReader::new(ctx.db.clone());
    let batch_size = ctx.batch_size;
    let mut summary = StageSummary::default();
    let mut checked = 0usize;
    let mut offset = 0;

    loop {
        let page = match ctx
            .retry
            .run_db("read project controls", || reader.project_controls(batch_size, offset))
            .await
        {
            Ok(page) => page,
            Err(err) => {
                warn!(offset, error = %err, "Failed to read project controls");
                summary.fail(EntityFailure::unscoped(format!("project_controls@{offset}"), &err));
                break;
            }
        };
        let page_len = page.len();

        for pc in page {
            checked += 1;
            match heal_one(ctx, &reader, &pc).await {
                Ok(true) => summary.counters_healed += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(project_control = %pc.id, error = %err, "Failed to heal counter");
                    summary.fail(EntityFailure::unscoped(pc.id, &err));
                }
            }
        }

        if page_len < batch_size {
            break;
        }
        offset += batch_size;
    }

    info!(checked, healed = summary.counters_healed, "Counter healing complete");
    summary
}

/// Rewrite one stored counter if it differs from the link count.
async fn heal_one(
    ctx: &SyncContext,
    reader: &EntityReader,
    pc: &ProjectControlRow,
) -> std::result::Result<bool, SyncError> {
    let actual = ctx
        .retry
        .run_db("count links", || reader.linked_evidence_count(&pc.id))
        .await?;
    if actual == pc.evidence_count {
        return Ok(false);
    }
    ctx.retry
        .run_db("write counter", || {
            project_controls::update_evidence_count(&ctx.db, &pc.id, actual)
        })
        .await?;
    debug!(
        project_control = %pc.id,
        stored = pc.evidence_count,
        actual,
        "Healed evidence counter"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folding_is_case_only() {
        let control = tag_set(&["Policy", "Access"]);
        assert!(shares_tag(&control, &tag_set(&["policy"])));
        assert!(shares_tag(&control, &tag_set(&["ACCESS", "network"])));
        assert!(!shares_tag(&control, &tag_set(&["policy "])));
        assert!(!shares_tag(&control, &tag_set(&["policies"])));
    }

    #[test]
    fn empty_sets_never_match() {
        let empty: BTreeSet<String> = BTreeSet::new();
        assert!(!shares_tag(&empty, &tag_set(&["policy"])));
        assert!(!shares_tag(&tag_set(&["policy"]), &empty));
    }
}
