//! In-memory implementation of [`GraphStore`].
//!
//! Mirrors the Neo4j semantics the synchronizer relies on: `MERGE` on key,
//! key-only endpoints created by edge merges, and detach-delete. Failures can
//! be injected per key to exercise the best-effort batch paths.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::model::{EdgeKind, EdgeSide, EntityKind};
use crate::store::{ControlTags, EvidenceTags, GraphCounts, GraphStore, NodeAttrs};

type NodeKey = (EntityKind, String);

#[derive(Default)]
struct State {
    /// `None` marks a key-only node created as an edge endpoint.
    nodes: BTreeMap<NodeKey, Option<NodeAttrs>>,
    edges: BTreeSet<(EdgeKind, String, String)>,
}

impl State {
    fn ensure_node(&mut self, kind: EntityKind, key: &str) {
        self.nodes.entry((kind, key.to_string())).or_insert(None);
    }

    fn keys_of(&self, kind: EntityKind) -> impl Iterator<Item = &String> {
        self.nodes
            .keys()
            .filter(move |(k, _)| *k == kind)
            .map(|(_, key)| key)
    }

    fn targets(&self, edge: EdgeKind, from: &str) -> Vec<String> {
        self.edges
            .iter()
            .filter(|(e, f, _)| *e == edge && f == from)
            .map(|(_, _, t)| t.clone())
            .collect()
    }

    fn attr(&self, kind: EntityKind, key: &str, name: &str) -> Option<String> {
        self.nodes
            .get(&(kind, key.to_string()))
            .and_then(|attrs| attrs.as_ref())
            .and_then(|attrs| attrs.get(name).cloned())
    }

    fn tag_names(&self, kind: EntityKind, key: &str) -> Vec<String> {
        let Some(edge) = tag_edge(kind) else {
            return Vec::new();
        };
        self.targets(edge, key)
            .iter()
            .filter_map(|tag| self.attr(EntityKind::Tag, tag, "name"))
            .collect()
    }
}

fn tag_edge(kind: EntityKind) -> Option<EdgeKind> {
    match kind {
        EntityKind::Control => Some(EdgeKind::ControlTag),
        EntityKind::Evidence => Some(EdgeKind::EvidenceTag),
        _ => None,
    }
}

/// Graph store held entirely in memory.
#[derive(Default)]
pub struct MemoryGraph {
    state: RwLock<State>,
    faults: Mutex<HashMap<String, u32>>,
    unavailable: AtomicBool,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` operations that touch `key`.
    pub fn inject_fault(&self, key: &str, times: u32) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(key.to_string(), times);
        }
    }

    /// Make every operation fail, as if the server were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Insert a key-only node without going through an edge merge.
    pub async fn insert_partial_node(&self, kind: EntityKind, key: &str) {
        self.state.write().await.ensure_node(kind, key);
    }

    pub async fn contains_node(&self, kind: EntityKind, key: &str) -> bool {
        self.state
            .read()
            .await
            .nodes
            .contains_key(&(kind, key.to_string()))
    }

    /// Every `(from, to)` pair of one edge kind.
    pub async fn edges_of(&self, edge: EdgeKind) -> Vec<(String, String)> {
        self.state
            .read()
            .await
            .edges
            .iter()
            .filter(|(e, _, _)| *e == edge)
            .map(|(_, f, t)| (f.clone(), t.clone()))
            .collect()
    }

    fn check(&self, keys: &[&str]) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("graph store unavailable");
        }
        let mut faults = self
            .faults
            .lock()
            .map_err(|_| anyhow!("fault table lock poisoned"))?;
        for key in keys {
            if let Some(remaining) = faults.get_mut(*key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    bail!("injected fault for '{key}'");
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn upsert_node(&self, kind: EntityKind, key: &str, attrs: &NodeAttrs) -> Result<()> {
        self.check(&[key])?;
        let full: NodeAttrs = kind
            .attributes()
            .iter()
            .map(|name| {
                let value = attrs.get(*name).cloned().unwrap_or_default();
                (name.to_string(), value)
            })
            .collect();
        self.state
            .write()
            .await
            .nodes
            .insert((kind, key.to_string()), Some(full));
        Ok(())
    }

    async fn detach_delete_node(&self, kind: EntityKind, key: &str) -> Result<bool> {
        self.check(&[key])?;
        let mut state = self.state.write().await;
        let existed = state.nodes.remove(&(kind, key.to_string())).is_some();
        state.edges.retain(|(edge, from, to)| {
            !((edge.from_kind() == kind && from == key) || (edge.to_kind() == kind && to == key))
        });
        Ok(existed)
    }

    async fn node_keys(&self, kind: EntityKind) -> Result<BTreeSet<String>> {
        self.check(&[])?;
        Ok(self.state.read().await.keys_of(kind).cloned().collect())
    }

    async fn node_attrs(&self, kind: EntityKind, key: &str) -> Result<Option<NodeAttrs>> {
        self.check(&[key])?;
        let state = self.state.read().await;
        Ok(state
            .nodes
            .get(&(kind, key.to_string()))
            .map(|attrs| attrs.clone().unwrap_or_default()))
    }

    async fn unhydrated_keys(&self, kind: EntityKind) -> Result<Vec<String>> {
        self.check(&[])?;
        let state = self.state.read().await;
        Ok(state
            .nodes
            .iter()
            .filter(|((k, _), attrs)| *k == kind && attrs.is_none())
            .map(|((_, key), _)| key.clone())
            .collect())
    }

    async fn merge_edge(&self, edge: EdgeKind, from: &str, to: &str) -> Result<bool> {
        self.check(&[from, to])?;
        let mut state = self.state.write().await;
        state.ensure_node(edge.from_kind(), from);
        state.ensure_node(edge.to_kind(), to);
        Ok(state.edges.insert((edge, from.to_string(), to.to_string())))
    }

    async fn delete_edge(&self, edge: EdgeKind, from: &str, to: &str) -> Result<bool> {
        self.check(&[from, to])?;
        Ok(self
            .state
            .write()
            .await
            .edges
            .remove(&(edge, from.to_string(), to.to_string())))
    }

    async fn delete_all_edges(&self, edge: EdgeKind) -> Result<usize> {
        self.check(&[])?;
        let mut state = self.state.write().await;
        let before = state.edges.len();
        state.edges.retain(|(e, _, _)| *e != edge);
        Ok(before - state.edges.len())
    }

    async fn edge_pairs(&self, edge: EdgeKind) -> Result<Vec<(String, String)>> {
        self.check(&[])?;
        Ok(self.edges_of(edge).await)
    }

    async fn edge_targets(&self, edge: EdgeKind, from: &str) -> Result<Vec<String>> {
        self.check(&[from])?;
        Ok(self.state.read().await.targets(edge, from))
    }

    async fn edge_sources(&self, edge: EdgeKind, to: &str) -> Result<Vec<String>> {
        self.check(&[to])?;
        Ok(self
            .state
            .read()
            .await
            .edges
            .iter()
            .filter(|(e, _, t)| *e == edge && t == to)
            .map(|(_, f, _)| f.clone())
            .collect())
    }

    async fn edge_degrees(&self, edge: EdgeKind, side: EdgeSide) -> Result<Vec<(String, usize)>> {
        self.check(&[])?;
        let state = self.state.read().await;
        let kind = match side {
            EdgeSide::Outgoing => edge.from_kind(),
            EdgeSide::Incoming => edge.to_kind(),
        };
        let mut degrees: BTreeMap<String, usize> =
            state.keys_of(kind).map(|key| (key.clone(), 0)).collect();
        for (e, from, to) in &state.edges {
            if *e != edge {
                continue;
            }
            let key = match side {
                EdgeSide::Outgoing => from,
                EdgeSide::Incoming => to,
            };
            if let Some(degree) = degrees.get_mut(key) {
                *degree += 1;
            }
        }
        Ok(degrees.into_iter().collect())
    }

    async fn tag_names(&self, kind: EntityKind, key: &str) -> Result<Vec<String>> {
        self.check(&[key])?;
        Ok(self.state.read().await.tag_names(kind, key))
    }

    async fn controls_of_standard(&self, standard_id: &str) -> Result<Vec<ControlTags>> {
        self.check(&[standard_id])?;
        let state = self.state.read().await;
        let controls: BTreeSet<&String> = state
            .edges
            .iter()
            .filter(|(e, _, t)| *e == EdgeKind::ControlStandard && t == standard_id)
            .map(|(_, f, _)| f)
            .collect();
        Ok(controls
            .into_iter()
            .map(|id| ControlTags {
                id: id.clone(),
                code: state.attr(EntityKind::Control, id, "code"),
                title: state.attr(EntityKind::Control, id, "title"),
                tags: state.tag_names(EntityKind::Control, id),
            })
            .collect())
    }

    async fn evidence_tags(&self, uploader: Option<&str>) -> Result<Vec<EvidenceTags>> {
        self.check(uploader.as_slice())?;
        let state = self.state.read().await;
        let ids: BTreeSet<String> = match uploader {
            Some(user) => state.targets(EdgeKind::UserEvidence, user).into_iter().collect(),
            None => state.keys_of(EntityKind::Evidence).cloned().collect(),
        };
        Ok(ids
            .into_iter()
            .map(|id| EvidenceTags {
                tags: state.tag_names(EntityKind::Evidence, &id),
                id,
            })
            .collect())
    }

    async fn standards(&self) -> Result<Vec<(String, String)>> {
        self.check(&[])?;
        let state = self.state.read().await;
        Ok(state
            .keys_of(EntityKind::Framework)
            .map(|key| {
                let name = state
                    .attr(EntityKind::Framework, key, "name")
                    .unwrap_or_default();
                (key.clone(), name)
            })
            .collect())
    }

    async fn counts(&self) -> Result<GraphCounts> {
        self.check(&[])?;
        let state = self.state.read().await;
        let mut by_label = BTreeMap::new();
        for (kind, _) in state.nodes.keys() {
            *by_label.entry(kind.label().to_string()).or_insert(0) += 1;
        }
        Ok(GraphCounts {
            nodes: state.nodes.len(),
            relationships: state.edges.len(),
            by_label,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> NodeAttrs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn merge_edge_creates_partial_endpoints_once() {
        let graph = MemoryGraph::new();
        assert!(graph.merge_edge(EdgeKind::UserEvidence, "u1", "e1").await.unwrap());
        assert!(!graph.merge_edge(EdgeKind::UserEvidence, "u1", "e1").await.unwrap());

        assert_eq!(graph.edges_of(EdgeKind::UserEvidence).await.len(), 1);
        assert_eq!(
            graph.unhydrated_keys(EntityKind::User).await.unwrap(),
            vec!["u1".to_string()]
        );
    }

    #[tokio::test]
    async fn upsert_sets_every_attribute() {
        let graph = MemoryGraph::new();
        graph
            .upsert_node(EntityKind::User, "u1", &attrs(&[("email", "a@x"), ("role", "admin")]))
            .await
            .unwrap();
        graph
            .upsert_node(EntityKind::User, "u1", &attrs(&[("email", "b@x")]))
            .await
            .unwrap();

        let stored = graph.node_attrs(EntityKind::User, "u1").await.unwrap().unwrap();
        assert_eq!(stored, attrs(&[("email", "b@x"), ("role", "")]));
        assert!(graph.unhydrated_keys(EntityKind::User).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn detach_delete_removes_attached_edges_only() {
        let graph = MemoryGraph::new();
        graph.merge_edge(EdgeKind::ControlStandard, "c1", "f1").await.unwrap();
        graph.merge_edge(EdgeKind::ControlStandard, "c2", "f2").await.unwrap();

        assert!(graph.detach_delete_node(EntityKind::Framework, "f1").await.unwrap());
        assert!(!graph.detach_delete_node(EntityKind::Framework, "f1").await.unwrap());

        assert_eq!(
            graph.edges_of(EdgeKind::ControlStandard).await,
            vec![("c2".to_string(), "f2".to_string())]
        );
        assert!(graph.contains_node(EntityKind::Control, "c1").await);
    }

    #[tokio::test]
    async fn degrees_include_nodes_without_edges() {
        let graph = MemoryGraph::new();
        graph.upsert_node(EntityKind::Evidence, "e1", &NodeAttrs::new()).await.unwrap();
        graph.merge_edge(EdgeKind::EvidenceProject, "e2", "p1").await.unwrap();
        graph.merge_edge(EdgeKind::EvidenceProject, "e2", "p2").await.unwrap();

        let degrees = graph
            .edge_degrees(EdgeKind::EvidenceProject, EdgeSide::Outgoing)
            .await
            .unwrap();
        assert_eq!(degrees, vec![("e1".to_string(), 0), ("e2".to_string(), 2)]);
    }

    #[tokio::test]
    async fn injected_faults_are_consumed() {
        let graph = MemoryGraph::new();
        graph.inject_fault("t1", 1);
        assert!(graph.upsert_node(EntityKind::Tag, "t1", &NodeAttrs::new()).await.is_err());
        assert!(graph.upsert_node(EntityKind::Tag, "t1", &NodeAttrs::new()).await.is_ok());

        graph.set_unavailable(true);
        assert!(graph.counts().await.is_err());
    }
}
