//! Entity reader over the authoritative store.
//!
//! Converts relational rows into [`EntityRecord`]s: the node attributes to
//! mirror and the structural edges the row owns. Pure reads.

use std::collections::BTreeSet;

use audit_db::queries::{
    controls, evidence, frameworks, project_controls, projects, relations, tags, users,
};
use audit_db::queries::project_controls::ProjectControlRow;
use audit_db::{DbPool, DbResult};

use crate::error::SyncError;
use crate::model::{EdgeKind, EntityKind};
use crate::store::NodeAttrs;

/// One edge an authoritative row asserts, oriented as the graph stores it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EdgeRef {
    pub edge: EdgeKind,
    pub from: String,
    pub to: String,
}

impl EdgeRef {
    fn new(edge: EdgeKind, from: &str, to: &str) -> Self {
        Self {
            edge,
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// An authoritative row ready to be projected.
#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub kind: EntityKind,
    pub id: String,
    pub attrs: NodeAttrs,
    /// Edges owned by this row (see [`EdgeKind::owner`]).
    pub edges: Vec<EdgeRef>,
    /// First required field that is null in the row.
    pub missing: Option<&'static str>,
}

impl EntityRecord {
    fn new(kind: EntityKind, id: &str, attrs: &[(&str, &str)]) -> Self {
        Self {
            kind,
            id: id.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            edges: Vec::new(),
            missing: None,
        }
    }

    /// Record an edge whose endpoint is a required, possibly null, column.
    fn required(&mut self, field: &'static str, edge: Option<EdgeRef>) {
        match edge {
            Some(edge) => self.edges.push(edge),
            None => {
                if self.missing.is_none() {
                    self.missing = Some(field);
                }
            }
        }
    }

    /// Fails with a data error when a required field is null.
    pub fn validate(&self) -> Result<(), SyncError> {
        match self.missing {
            Some(field) => Err(SyncError::Data {
                kind: self.kind,
                id: self.id.clone(),
                field,
            }),
            None => Ok(()),
        }
    }

    /// The endpoint this row assigns to `edge`, seen from this row's node.
    pub fn endpoint(&self, edge: EdgeKind) -> Option<&str> {
        self.edges.iter().find(|e| e.edge == edge).map(|e| {
            if e.from == self.id && edge.from_kind() == self.kind {
                e.to.as_str()
            } else {
                e.from.as_str()
            }
        })
    }
}

impl From<frameworks::FrameworkRow> for EntityRecord {
    fn from(row: frameworks::FrameworkRow) -> Self {
        EntityRecord::new(EntityKind::Framework, &row.id, &[("name", &row.name)])
    }
}

impl From<controls::ControlRow> for EntityRecord {
    fn from(row: controls::ControlRow) -> Self {
        let mut record = EntityRecord::new(
            EntityKind::Control,
            &row.id,
            &[("code", &row.code), ("title", &row.title)],
        );
        record.required(
            "framework_id",
            row.framework_id
                .as_deref()
                .map(|fw| EdgeRef::new(EdgeKind::ControlStandard, &row.id, fw)),
        );
        for tag in &row.tag_ids {
            record.edges.push(EdgeRef::new(EdgeKind::ControlTag, &row.id, tag));
        }
        record
    }
}

impl From<tags::TagRow> for EntityRecord {
    fn from(row: tags::TagRow) -> Self {
        EntityRecord::new(EntityKind::Tag, &row.id, &[("name", &row.name)])
    }
}

impl From<evidence::EvidenceRow> for EntityRecord {
    fn from(row: evidence::EvidenceRow) -> Self {
        let mut record =
            EntityRecord::new(EntityKind::Evidence, &row.id, &[("file_name", &row.file_name)]);
        record.required(
            "project_id",
            row.project_id
                .as_deref()
                .map(|p| EdgeRef::new(EdgeKind::EvidenceProject, &row.id, p)),
        );
        record.required(
            "uploaded_by_id",
            row.uploaded_by_id
                .as_deref()
                .map(|u| EdgeRef::new(EdgeKind::UserEvidence, u, &row.id)),
        );
        for tag in &row.tag_ids {
            record.edges.push(EdgeRef::new(EdgeKind::EvidenceTag, &row.id, tag));
        }
        for control in &row.control_ids {
            record
                .edges
                .push(EdgeRef::new(EdgeKind::EvidenceControl, &row.id, control));
        }
        record
    }
}

impl From<projects::ProjectRow> for EntityRecord {
    fn from(row: projects::ProjectRow) -> Self {
        let mut record = EntityRecord::new(EntityKind::Project, &row.id, &[("name", &row.name)]);
        if let Some(auditor) = row.auditor_id.as_deref() {
            record
                .edges
                .push(EdgeRef::new(EdgeKind::ProjectAuditor, auditor, &row.id));
        }
        if let Some(reviewer) = row.reviewer_id.as_deref() {
            record
                .edges
                .push(EdgeRef::new(EdgeKind::ProjectReviewer, reviewer, &row.id));
        }
        record
    }
}

impl From<users::UserRow> for EntityRecord {
    fn from(row: users::UserRow) -> Self {
        EntityRecord::new(
            EntityKind::User,
            &row.id,
            &[("email", &row.email), ("role", &row.role)],
        )
    }
}

fn records<R: Into<EntityRecord>>(rows: Vec<R>) -> Vec<EntityRecord> {
    rows.into_iter().map(Into::into).collect()
}

/// Read-only access to authoritative entities.
#[derive(Clone)]
pub struct EntityReader {
    db: DbPool,
}

impl EntityReader {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// One page of rows of `kind`, ordered by id.
    pub fn page(&self, kind: EntityKind, limit: usize, offset: usize) -> DbResult<Vec<EntityRecord>> {
        let db = &self.db;
        Ok(match kind {
            EntityKind::Framework => records(frameworks::list_frameworks(db, limit, offset)?),
            EntityKind::Control => records(controls::list_controls(db, limit, offset)?),
            EntityKind::Tag => records(tags::list_tags(db, limit, offset)?),
            EntityKind::Evidence => records(evidence::list_evidence(db, limit, offset)?),
            EntityKind::Project => records(projects::list_projects(db, limit, offset)?),
            EntityKind::User => records(users::list_users(db, limit, offset)?),
        })
    }

    pub fn get(&self, kind: EntityKind, id: &str) -> DbResult<Option<EntityRecord>> {
        let db = &self.db;
        Ok(match kind {
            EntityKind::Framework => frameworks::get_framework(db, id)?.map(Into::into),
            EntityKind::Control => controls::get_control(db, id)?.map(Into::into),
            EntityKind::Tag => tags::get_tag(db, id)?.map(Into::into),
            EntityKind::Evidence => evidence::get_evidence(db, id)?.map(Into::into),
            EntityKind::Project => projects::get_project(db, id)?.map(Into::into),
            EntityKind::User => users::get_user(db, id)?.map(Into::into),
        })
    }

    /// Full authoritative id set of one kind.
    pub fn ids(&self, kind: EntityKind) -> DbResult<BTreeSet<String>> {
        let db = &self.db;
        let ids = match kind {
            EntityKind::Framework => frameworks::list_framework_ids(db)?,
            EntityKind::Control => controls::list_control_ids(db)?,
            EntityKind::Tag => tags::list_tag_ids(db)?,
            EntityKind::Evidence => evidence::list_evidence_ids(db)?,
            EntityKind::Project => projects::list_project_ids(db)?,
            EntityKind::User => users::list_user_ids(db)?,
        };
        Ok(ids.into_iter().collect())
    }

    pub fn exists(&self, kind: EntityKind, id: &str) -> DbResult<bool> {
        let db = &self.db;
        match kind {
            EntityKind::Framework => frameworks::framework_exists(db, id),
            EntityKind::Control => controls::control_exists(db, id),
            EntityKind::Tag => tags::tag_exists(db, id),
            EntityKind::Evidence => evidence::evidence_exists(db, id),
            EntityKind::Project => projects::project_exists(db, id),
            EntityKind::User => users::user_exists(db, id),
        }
    }

    /// Authoritative endpoint pairs of one edge kind.
    pub fn edge_pairs(&self, edge: EdgeKind) -> DbResult<BTreeSet<(String, String)>> {
        Ok(relations::list_pairs(&self.db, edge.relation())?
            .into_iter()
            .collect())
    }

    pub fn project_controls(&self, limit: usize, offset: usize) -> DbResult<Vec<ProjectControlRow>> {
        project_controls::list_project_controls(&self.db, limit, offset)
    }

    pub fn linked_evidence_count(&self, project_control_id: &str) -> DbResult<i64> {
        project_controls::count_linked_evidence(&self.db, project_control_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_db::init_in_memory;

    #[test]
    fn evidence_without_uploader_is_a_data_error() {
        let db = init_in_memory().unwrap();
        audit_db::queries::users::create_user(&db, "u1", "a@x", "customer").unwrap();
        audit_db::queries::projects::create_project(
            &db,
            &audit_db::queries::projects::NewProject {
                id: "p1",
                name: "P",
                ..Default::default()
            },
        )
        .unwrap();
        evidence::create_evidence(&db, "e1", "a.pdf", Some("p1"), None).unwrap();

        let reader = EntityReader::new(db);
        let record = reader.get(EntityKind::Evidence, "e1").unwrap().unwrap();
        assert_eq!(record.missing, Some("uploaded_by_id"));
        assert_eq!(record.endpoint(EdgeKind::EvidenceProject), Some("p1"));
        assert!(matches!(
            record.validate(),
            Err(SyncError::Data { field: "uploaded_by_id", .. })
        ));
    }

    #[test]
    fn endpoint_is_seen_from_the_owning_node() {
        let db = init_in_memory().unwrap();
        audit_db::queries::users::create_user(&db, "u1", "a@x", "customer").unwrap();
        audit_db::queries::projects::create_project(
            &db,
            &audit_db::queries::projects::NewProject {
                id: "p1",
                name: "P",
                ..Default::default()
            },
        )
        .unwrap();
        evidence::create_evidence(&db, "e1", "a.pdf", Some("p1"), Some("u1")).unwrap();

        let record = EntityReader::new(db)
            .get(EntityKind::Evidence, "e1")
            .unwrap()
            .unwrap();
        assert_eq!(record.endpoint(EdgeKind::UserEvidence), Some("u1"));
        assert!(record.validate().is_ok());
    }
}
