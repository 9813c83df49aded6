//! GraphStore trait definition
//!
//! The fixed set of graph operations the synchronizer and the coverage engine
//! need. Stages hold an `Arc<dyn GraphStore>` so tests can substitute
//! [`MemoryGraph`](crate::memory::MemoryGraph) for Neo4j.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::model::{EdgeKind, EdgeSide, EntityKind};

/// Mirrored attribute values keyed by property name.
pub type NodeAttrs = BTreeMap<String, String>;

/// A control under a standard with its tag names as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlTags {
    pub id: String,
    pub code: Option<String>,
    pub title: Option<String>,
    pub tags: Vec<String>,
}

/// An evidence node with its tag names as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceTags {
    pub id: String,
    pub tags: Vec<String>,
}

/// Node and relationship counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphCounts {
    pub nodes: usize,
    pub relationships: usize,
    pub by_label: BTreeMap<String, usize>,
}

/// Abstract interface for all projection reads and writes.
#[async_trait]
pub trait GraphStore: Send + Sync {
    // ========================================================================
    // Nodes
    // ========================================================================

    /// Create or update the node for `key`, setting every mirrored attribute
    /// of `kind`. Attributes absent from `attrs` are written as empty strings.
    async fn upsert_node(&self, kind: EntityKind, key: &str, attrs: &NodeAttrs) -> Result<()>;

    /// Detach-delete one node. Returns whether it existed at delete time.
    async fn detach_delete_node(&self, kind: EntityKind, key: &str) -> Result<bool>;

    /// Every key of one label.
    async fn node_keys(&self, kind: EntityKind) -> Result<BTreeSet<String>>;

    /// Mirrored attributes of one node; `None` if the node does not exist.
    async fn node_attrs(&self, kind: EntityKind, key: &str) -> Result<Option<NodeAttrs>>;

    /// Keys of nodes created only as edge endpoints (no mirrored attributes).
    async fn unhydrated_keys(&self, kind: EntityKind) -> Result<Vec<String>>;

    // ========================================================================
    // Edges
    // ========================================================================

    /// Create the edge if absent, creating key-only endpoints as needed.
    /// Returns whether a new edge was created.
    async fn merge_edge(&self, edge: EdgeKind, from: &str, to: &str) -> Result<bool>;

    /// Delete one edge. Returns whether it existed.
    async fn delete_edge(&self, edge: EdgeKind, from: &str, to: &str) -> Result<bool>;

    /// Delete every edge of one kind. Returns the number deleted.
    async fn delete_all_edges(&self, edge: EdgeKind) -> Result<usize>;

    /// Every `(from, to)` pair of one edge kind.
    async fn edge_pairs(&self, edge: EdgeKind) -> Result<Vec<(String, String)>>;

    /// Keys reachable from `from` along `edge`.
    async fn edge_targets(&self, edge: EdgeKind, from: &str) -> Result<Vec<String>>;

    /// Keys with an `edge` pointing at `to`.
    async fn edge_sources(&self, edge: EdgeKind, to: &str) -> Result<Vec<String>>;

    /// Edge count per node on one side of `edge`, including nodes with none.
    async fn edge_degrees(&self, edge: EdgeKind, side: EdgeSide) -> Result<Vec<(String, usize)>>;

    // ========================================================================
    // Traversals
    // ========================================================================

    /// Tag names attached to one node through HAS_TAG.
    async fn tag_names(&self, kind: EntityKind, key: &str) -> Result<Vec<String>>;

    /// Controls belonging to one standard, with their tag names.
    async fn controls_of_standard(&self, standard_id: &str) -> Result<Vec<ControlTags>>;

    /// Evidence with tag names; only evidence uploaded by `uploader` when given.
    async fn evidence_tags(&self, uploader: Option<&str>) -> Result<Vec<EvidenceTags>>;

    /// Every standard as `(key, name)`, ordered by key.
    async fn standards(&self) -> Result<Vec<(String, String)>>;

    async fn counts(&self) -> Result<GraphCounts>;
}
