//! Node and relationship kinds of the projection.
//!
//! Labels, relationship types and property keys are taken only from these
//! closed enums, so they are the only parts of a Cypher statement that are
//! ever interpolated; every value travels as a parameter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Authoritative entity types mirrored into the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Framework,
    Control,
    Tag,
    Evidence,
    Project,
    User,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Framework,
        EntityKind::Control,
        EntityKind::Tag,
        EntityKind::Evidence,
        EntityKind::Project,
        EntityKind::User,
    ];

    /// The Neo4j node label for this entity type.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Framework => "Standard",
            EntityKind::Control => "Control",
            EntityKind::Tag => "Tag",
            EntityKind::Evidence => "Evidence",
            EntityKind::Project => "Project",
            EntityKind::User => "User",
        }
    }

    /// Mirrored scalar attributes, in a fixed order.
    ///
    /// A node that lacks the first attribute is considered unhydrated.
    pub fn attributes(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Framework => &["name"],
            EntityKind::Control => &["code", "title"],
            EntityKind::Tag => &["name"],
            EntityKind::Evidence => &["file_name"],
            EntityKind::Project => &["name"],
            EntityKind::User => &["email", "role"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Framework => "framework",
            EntityKind::Control => "control",
            EntityKind::Tag => "tag",
            EntityKind::Evidence => "evidence",
            EntityKind::Project => "project",
            EntityKind::User => "user",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    /// Parse from string (case-insensitive). Graph label names are accepted too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "framework" | "frameworks" | "standard" | "standards" => Ok(Self::Framework),
            "control" | "controls" => Ok(Self::Control),
            "tag" | "tags" => Ok(Self::Tag),
            "evidence" => Ok(Self::Evidence),
            "project" | "projects" => Ok(Self::Project),
            "user" | "users" => Ok(Self::User),
            other => Err(format!("unknown entity kind '{other}'")),
        }
    }
}

/// Relationship types stored in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelType {
    BelongsTo,
    HasTag,
    Uploaded,
    Proves,
    Audits,
    Reviews,
}

impl RelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelType::BelongsTo => "BELONGS_TO",
            RelType::HasTag => "HAS_TAG",
            RelType::Uploaded => "UPLOADED",
            RelType::Proves => "PROVES",
            RelType::Audits => "AUDITS",
            RelType::Reviews => "REVIEWS",
        }
    }
}

/// A structural relationship together with its endpoint kinds.
///
/// `BELONGS_TO` appears twice with different endpoints, so edge identity is
/// always the triple `(from kind, type, to kind)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// (:Control)-[:BELONGS_TO]->(:Standard)
    ControlStandard,
    /// (:Control)-[:HAS_TAG]->(:Tag)
    ControlTag,
    /// (:Evidence)-[:HAS_TAG]->(:Tag)
    EvidenceTag,
    /// (:Evidence)-[:BELONGS_TO]->(:Project)
    EvidenceProject,
    /// (:User)-[:UPLOADED]->(:Evidence)
    UserEvidence,
    /// (:Evidence)-[:PROVES]->(:Control)
    EvidenceControl,
    /// (:User)-[:AUDITS]->(:Project)
    ProjectAuditor,
    /// (:User)-[:REVIEWS]->(:Project)
    ProjectReviewer,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 8] = [
        EdgeKind::ControlStandard,
        EdgeKind::ControlTag,
        EdgeKind::EvidenceTag,
        EdgeKind::EvidenceProject,
        EdgeKind::UserEvidence,
        EdgeKind::EvidenceControl,
        EdgeKind::ProjectAuditor,
        EdgeKind::ProjectReviewer,
    ];

    pub fn from_kind(&self) -> EntityKind {
        match self {
            EdgeKind::ControlStandard | EdgeKind::ControlTag => EntityKind::Control,
            EdgeKind::EvidenceTag | EdgeKind::EvidenceProject | EdgeKind::EvidenceControl => {
                EntityKind::Evidence
            }
            EdgeKind::UserEvidence | EdgeKind::ProjectAuditor | EdgeKind::ProjectReviewer => {
                EntityKind::User
            }
        }
    }

    pub fn to_kind(&self) -> EntityKind {
        match self {
            EdgeKind::ControlStandard => EntityKind::Framework,
            EdgeKind::ControlTag | EdgeKind::EvidenceTag => EntityKind::Tag,
            EdgeKind::EvidenceProject | EdgeKind::ProjectAuditor | EdgeKind::ProjectReviewer => {
                EntityKind::Project
            }
            EdgeKind::UserEvidence => EntityKind::Evidence,
            EdgeKind::EvidenceControl => EntityKind::Control,
        }
    }

    pub fn rel_type(&self) -> RelType {
        match self {
            EdgeKind::ControlStandard | EdgeKind::EvidenceProject => RelType::BelongsTo,
            EdgeKind::ControlTag | EdgeKind::EvidenceTag => RelType::HasTag,
            EdgeKind::UserEvidence => RelType::Uploaded,
            EdgeKind::EvidenceControl => RelType::Proves,
            EdgeKind::ProjectAuditor => RelType::Audits,
            EdgeKind::ProjectReviewer => RelType::Reviews,
        }
    }

    /// The authoritative relation this edge mirrors.
    pub fn relation(&self) -> audit_db::queries::relations::Relation {
        use audit_db::queries::relations::Relation;
        match self {
            EdgeKind::ControlStandard => Relation::ControlFramework,
            EdgeKind::ControlTag => Relation::ControlTag,
            EdgeKind::EvidenceTag => Relation::EvidenceTag,
            EdgeKind::EvidenceProject => Relation::EvidenceProject,
            EdgeKind::UserEvidence => Relation::UploaderEvidence,
            EdgeKind::EvidenceControl => Relation::EvidenceControl,
            EdgeKind::ProjectAuditor => Relation::AuditorProject,
            EdgeKind::ProjectReviewer => Relation::ReviewerProject,
        }
    }

    /// The entity whose authoritative row carries this relation; its build
    /// creates the edge.
    pub fn owner(&self) -> EntityKind {
        match self {
            EdgeKind::ControlStandard | EdgeKind::ControlTag => EntityKind::Control,
            EdgeKind::EvidenceTag
            | EdgeKind::EvidenceProject
            | EdgeKind::UserEvidence
            | EdgeKind::EvidenceControl => EntityKind::Evidence,
            EdgeKind::ProjectAuditor | EdgeKind::ProjectReviewer => EntityKind::Project,
        }
    }

    /// Whether a node may carry at most one edge of this kind on `side`.
    pub fn required_side(&self) -> Option<EdgeSide> {
        REQUIRED_EDGES
            .iter()
            .find(|(edge, _)| edge == self)
            .map(|(_, side)| *side)
    }

    /// Entity kinds whose projection creates or is anchored by this edge.
    pub fn touches(&self, kind: EntityKind) -> bool {
        self.from_kind() == kind || self.to_kind() == kind
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({})-[:{}]->({})",
            self.from_kind().label(),
            self.rel_type().as_str(),
            self.to_kind().label()
        )
    }
}

impl FromStr for EdgeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "control_standard" | "control_belongs_to" => Ok(Self::ControlStandard),
            "control_tag" | "control_has_tag" => Ok(Self::ControlTag),
            "evidence_tag" | "evidence_has_tag" => Ok(Self::EvidenceTag),
            "evidence_project" | "evidence_belongs_to" => Ok(Self::EvidenceProject),
            "user_evidence" | "uploaded" => Ok(Self::UserEvidence),
            "evidence_control" | "proves" => Ok(Self::EvidenceControl),
            "project_auditor" | "audits" => Ok(Self::ProjectAuditor),
            "project_reviewer" | "reviews" => Ok(Self::ProjectReviewer),
            other => Err(format!("unknown relationship '{other}'")),
        }
    }
}

/// Which endpoint of an edge a degree is counted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeSide {
    /// Count edges leaving nodes of `from_kind`.
    Outgoing,
    /// Count edges arriving at nodes of `to_kind`.
    Incoming,
}

/// Structural edges every node of a kind must have exactly once.
///
/// `(edge, side)`: the node carrying the requirement is on `side`.
pub const REQUIRED_EDGES: &[(EdgeKind, EdgeSide)] = &[
    (EdgeKind::EvidenceProject, EdgeSide::Outgoing),
    (EdgeKind::UserEvidence, EdgeSide::Incoming),
    (EdgeKind::ControlStandard, EdgeSide::Outgoing),
];

/// Reconciliation scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Scope {
    All,
    Entity(EntityKind),
    /// Counter healing only; touches no graph label.
    ProjectControl,
}

impl Scope {
    /// Entity kinds whose nodes this scope builds, collects and repairs.
    pub fn kinds(&self) -> Vec<EntityKind> {
        match self {
            Scope::All => EntityKind::ALL.to_vec(),
            Scope::Entity(kind) => vec![*kind],
            Scope::ProjectControl => Vec::new(),
        }
    }

    /// Whether this scope includes counter healing.
    pub fn heals_counters(&self) -> bool {
        matches!(
            self,
            Scope::All | Scope::ProjectControl | Scope::Entity(EntityKind::Evidence)
        )
    }

    /// Whether two runs may not execute at the same time.
    pub fn overlaps(&self, other: &Scope) -> bool {
        matches!(self, Scope::All) || matches!(other, Scope::All) || self == other
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => f.write_str("all"),
            Scope::Entity(kind) => write!(f, "{kind}"),
            Scope::ProjectControl => f.write_str("project_control"),
        }
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.to_string()
    }
}

impl TryFrom<String> for Scope {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" | "" => Ok(Scope::All),
            "project_control" | "project_controls" | "projectcontrol" | "counters" => {
                Ok(Scope::ProjectControl)
            }
            other => other.parse().map(Scope::Entity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_endpoints_match_structural_relationships() {
        assert_eq!(EdgeKind::ControlStandard.to_kind().label(), "Standard");
        assert_eq!(EdgeKind::UserEvidence.from_kind(), EntityKind::User);
        assert_eq!(EdgeKind::UserEvidence.rel_type().as_str(), "UPLOADED");
        assert_eq!(
            EdgeKind::EvidenceProject.to_string(),
            "(Evidence)-[:BELONGS_TO]->(Project)"
        );
    }

    #[test]
    fn scope_parsing_accepts_labels_and_kinds() {
        assert_eq!("all".parse::<Scope>().unwrap(), Scope::All);
        assert_eq!(
            "Standard".parse::<Scope>().unwrap(),
            Scope::Entity(EntityKind::Framework)
        );
        assert_eq!("counters".parse::<Scope>().unwrap(), Scope::ProjectControl);
        assert!("widgets".parse::<Scope>().is_err());
    }

    #[test]
    fn all_overlaps_everything_and_kinds_only_themselves() {
        let evidence = Scope::Entity(EntityKind::Evidence);
        let tags = Scope::Entity(EntityKind::Tag);
        assert!(Scope::All.overlaps(&tags));
        assert!(evidence.overlaps(&Scope::All));
        assert!(evidence.overlaps(&evidence));
        assert!(!evidence.overlaps(&tags));
        assert!(!Scope::ProjectControl.overlaps(&tags));
    }

    #[test]
    fn edge_kind_round_trips_through_cli_names() {
        assert_eq!("uploaded".parse::<EdgeKind>().unwrap(), EdgeKind::UserEvidence);
        assert_eq!(
            "evidence-project".parse::<EdgeKind>().unwrap(),
            EdgeKind::EvidenceProject
        );
    }
}
