//! Authoritative endpoint pairs for each structural relationship.
//!
//! Used when a relationship type is rebuilt from scratch and when measuring
//! drift. Pairs are `(from_id, to_id)` in the direction the graph stores them.

use crate::pool::{DbPool, DbResult};

use super::collect_pairs;

/// Relationship sources with a fixed query each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// control -> framework
    ControlFramework,
    /// control -> tag
    ControlTag,
    /// evidence -> tag
    EvidenceTag,
    /// evidence -> project
    EvidenceProject,
    /// uploader -> evidence
    UploaderEvidence,
    /// evidence -> control, via explicit project-control links
    EvidenceControl,
    /// auditor -> project
    AuditorProject,
    /// reviewer -> project
    ReviewerProject,
}

impl Relation {
    fn sql(self) -> &'static str {
        match self {
            Relation::ControlFramework => {
                "SELECT id, framework_id FROM controls WHERE framework_id IS NOT NULL"
            }
            Relation::ControlTag => "SELECT control_id, tag_id FROM control_tags",
            Relation::EvidenceTag => "SELECT evidence_id, tag_id FROM evidence_tags",
            Relation::EvidenceProject => {
                "SELECT id, project_id FROM evidence WHERE project_id IS NOT NULL"
            }
            Relation::UploaderEvidence => {
                "SELECT uploaded_by_id, id FROM evidence WHERE uploaded_by_id IS NOT NULL"
            }
            Relation::EvidenceControl => {
                "SELECT DISTINCT ec.evidence_id, pc.control_id
                 FROM evidence_controls ec
                 JOIN project_controls pc ON pc.id = ec.project_control_id"
            }
            Relation::AuditorProject => {
                "SELECT auditor_id, id FROM projects WHERE auditor_id IS NOT NULL"
            }
            Relation::ReviewerProject => {
                "SELECT reviewer_id, id FROM projects WHERE reviewer_id IS NOT NULL"
            }
        }
    }
}

/// All `(from, to)` pairs of a relation.
pub fn list_pairs(pool: &DbPool, relation: Relation) -> DbResult<Vec<(String, String)>> {
    pool.with_conn(|conn| collect_pairs(conn, relation.sql()))
}
