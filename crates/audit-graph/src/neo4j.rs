//! `GraphStore` implementation over Neo4j.
//!
//! Values always travel as query parameters. Labels, relationship types and
//! property keys are formatted in from [`EntityKind`] and [`EdgeKind`], which
//! are closed enums.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use async_trait::async_trait;
use neo4rs::query;

use crate::client::{column, GraphClient};
use crate::model::{EdgeKind, EdgeSide, EntityKind};
use crate::store::{ControlTags, EvidenceTags, GraphCounts, GraphStore, NodeAttrs};

/// Neo4j-backed projection store.
#[derive(Clone)]
pub struct Neo4jStore {
    client: GraphClient,
}

impl Neo4jStore {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &GraphClient {
        &self.client
    }

    async fn ids(&self, q: neo4rs::Query) -> Result<Vec<String>> {
        let rows = self.client.query(q).await?;
        rows.iter().map(|row| column::<String>(row, "id")).collect()
    }
}

/// `(a:From)-[:REL]->(b:To)` pattern for one edge kind.
fn edge_pattern(edge: EdgeKind, from: &str, to: &str) -> String {
    format!(
        "({}:{})-[r:{}]->({}:{})",
        from,
        edge.from_kind().label(),
        edge.rel_type().as_str(),
        to,
        edge.to_kind().label()
    )
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn upsert_node(&self, kind: EntityKind, key: &str, attrs: &NodeAttrs) -> Result<()> {
        let sets: Vec<String> = kind
            .attributes()
            .iter()
            .map(|name| format!("n.{name} = ${name}"))
            .collect();
        let cypher = format!(
            "MERGE (n:{} {{id: $id}}) SET {}",
            kind.label(),
            sets.join(", ")
        );

        let mut q = query(&cypher).param("id", key);
        for name in kind.attributes() {
            let value = attrs.get(*name).cloned().unwrap_or_default();
            q = q.param(name, value);
        }
        self.client
            .execute(q)
            .await
            .with_context(|| format!("Failed to upsert {} node {}", kind.label(), key))
    }

    async fn detach_delete_node(&self, kind: EntityKind, key: &str) -> Result<bool> {
        let cypher = format!(
            "MATCH (n:{} {{id: $id}}) DETACH DELETE n RETURN count(*) AS deleted",
            kind.label()
        );
        let deleted: i64 = self
            .client
            .query_scalar(query(&cypher).param("id", key), "deleted")
            .await
            .with_context(|| format!("Failed to delete {} node {}", kind.label(), key))?
            .unwrap_or(0);
        Ok(deleted > 0)
    }

    async fn node_keys(&self, kind: EntityKind) -> Result<BTreeSet<String>> {
        let cypher = format!("MATCH (n:{}) RETURN n.id AS id", kind.label());
        let ids = self
            .ids(query(&cypher))
            .await
            .with_context(|| format!("Failed to list {} keys", kind.label()))?;
        Ok(ids.into_iter().collect())
    }

    async fn node_attrs(&self, kind: EntityKind, key: &str) -> Result<Option<NodeAttrs>> {
        let returns: Vec<String> = kind
            .attributes()
            .iter()
            .map(|name| format!("n.{name} AS {name}"))
            .collect();
        let cypher = format!(
            "MATCH (n:{} {{id: $id}}) RETURN {}",
            kind.label(),
            returns.join(", ")
        );
        let rows = self.client.query(query(&cypher).param("id", key)).await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let mut attrs = NodeAttrs::new();
        for name in kind.attributes() {
            if let Some(value) = column::<Option<String>>(row, name)? {
                attrs.insert(name.to_string(), value);
            }
        }
        Ok(Some(attrs))
    }

    async fn unhydrated_keys(&self, kind: EntityKind) -> Result<Vec<String>> {
        let cypher = format!(
            "MATCH (n:{}) WHERE n.{} IS NULL RETURN n.id AS id ORDER BY id",
            kind.label(),
            kind.attributes()[0]
        );
        self.ids(query(&cypher))
            .await
            .with_context(|| format!("Failed to list unhydrated {} nodes", kind.label()))
    }

    async fn merge_edge(&self, edge: EdgeKind, from: &str, to: &str) -> Result<bool> {
        let rel = edge.rel_type().as_str();
        let cypher = format!(
            "MERGE (a:{from_label} {{id: $from}}) \
             MERGE (b:{to_label} {{id: $to}}) \
             WITH a, b \
             OPTIONAL MATCH (a)-[existing:{rel}]->(b) \
             WITH a, b, count(existing) AS before \
             MERGE (a)-[:{rel}]->(b) \
             RETURN before = 0 AS created",
            from_label = edge.from_kind().label(),
            to_label = edge.to_kind().label(),
        );
        let created: bool = self
            .client
            .query_scalar(query(&cypher).param("from", from).param("to", to), "created")
            .await
            .with_context(|| format!("Failed to merge {edge} {from} -> {to}"))?
            .unwrap_or(false);
        Ok(created)
    }

    async fn delete_edge(&self, edge: EdgeKind, from: &str, to: &str) -> Result<bool> {
        let cypher = format!(
            "MATCH {} WHERE a.id = $from AND b.id = $to DELETE r RETURN count(*) AS deleted",
            edge_pattern(edge, "a", "b")
        );
        let deleted: i64 = self
            .client
            .query_scalar(query(&cypher).param("from", from).param("to", to), "deleted")
            .await
            .with_context(|| format!("Failed to delete {edge} {from} -> {to}"))?
            .unwrap_or(0);
        Ok(deleted > 0)
    }

    async fn delete_all_edges(&self, edge: EdgeKind) -> Result<usize> {
        let cypher = format!(
            "MATCH {} DELETE r RETURN count(*) AS deleted",
            edge_pattern(edge, "a", "b")
        );
        let deleted: i64 = self
            .client
            .query_scalar(query(&cypher), "deleted")
            .await
            .with_context(|| format!("Failed to delete all {edge} edges"))?
            .unwrap_or(0);
        Ok(deleted as usize)
    }

    async fn edge_pairs(&self, edge: EdgeKind) -> Result<Vec<(String, String)>> {
        let cypher = format!(
            "MATCH {} RETURN a.id AS from_id, b.id AS to_id ORDER BY from_id, to_id",
            edge_pattern(edge, "a", "b")
        );
        let rows = self
            .client
            .query(query(&cypher))
            .await
            .with_context(|| format!("Failed to list {edge} edges"))?;
        rows.iter()
            .map(|row| Ok((column(row, "from_id")?, column(row, "to_id")?)))
            .collect()
    }

    async fn edge_targets(&self, edge: EdgeKind, from: &str) -> Result<Vec<String>> {
        let cypher = format!(
            "MATCH {} WHERE a.id = $from RETURN b.id AS id ORDER BY id",
            edge_pattern(edge, "a", "b")
        );
        self.ids(query(&cypher).param("from", from)).await
    }

    async fn edge_sources(&self, edge: EdgeKind, to: &str) -> Result<Vec<String>> {
        let cypher = format!(
            "MATCH {} WHERE b.id = $to RETURN a.id AS id ORDER BY id",
            edge_pattern(edge, "a", "b")
        );
        self.ids(query(&cypher).param("to", to)).await
    }

    async fn edge_degrees(&self, edge: EdgeKind, side: EdgeSide) -> Result<Vec<(String, usize)>> {
        let rel = edge.rel_type().as_str();
        let from_label = edge.from_kind().label();
        let to_label = edge.to_kind().label();
        let cypher = match side {
            EdgeSide::Outgoing => format!(
                "MATCH (n:{from_label}) OPTIONAL MATCH (n)-[r:{rel}]->(:{to_label}) \
                 RETURN n.id AS id, count(r) AS degree ORDER BY id"
            ),
            EdgeSide::Incoming => format!(
                "MATCH (n:{to_label}) OPTIONAL MATCH (:{from_label})-[r:{rel}]->(n) \
                 RETURN n.id AS id, count(r) AS degree ORDER BY id"
            ),
        };

        let rows = self
            .client
            .query(query(&cypher))
            .await
            .with_context(|| format!("Failed to count {edge} degrees"))?;
        rows.iter()
            .map(|row| {
                let id: String = column(row, "id")?;
                let degree: i64 = column(row, "degree")?;
                Ok((id, degree as usize))
            })
            .collect()
    }

    async fn tag_names(&self, kind: EntityKind, key: &str) -> Result<Vec<String>> {
        if !matches!(kind, EntityKind::Control | EntityKind::Evidence) {
            return Ok(Vec::new());
        }
        let cypher = format!(
            "MATCH (n:{} {{id: $id}})-[:HAS_TAG]->(t:Tag) \
             WHERE t.name IS NOT NULL RETURN t.name AS name",
            kind.label()
        );
        let rows = self.client.query(query(&cypher).param("id", key)).await?;
        rows.iter().map(|row| column::<String>(row, "name")).collect()
    }

    async fn controls_of_standard(&self, standard_id: &str) -> Result<Vec<ControlTags>> {
        let q = query(
            "MATCH (c:Control)-[:BELONGS_TO]->(:Standard {id: $id}) \
             OPTIONAL MATCH (c)-[:HAS_TAG]->(t:Tag) \
             RETURN c.id AS id, c.code AS code, c.title AS title, collect(t.name) AS tags \
             ORDER BY id",
        )
        .param("id", standard_id);

        let rows = self
            .client
            .query(q)
            .await
            .with_context(|| format!("Failed to read controls of standard {standard_id}"))?;
        rows.iter()
            .map(|row| {
                Ok(ControlTags {
                    id: column(row, "id")?,
                    code: column(row, "code")?,
                    title: column(row, "title")?,
                    tags: column(row, "tags")?,
                })
            })
            .collect()
    }

    async fn evidence_tags(&self, uploader: Option<&str>) -> Result<Vec<EvidenceTags>> {
        let q = match uploader {
            Some(user) => query(
                "MATCH (:User {id: $user})-[:UPLOADED]->(e:Evidence) \
                 OPTIONAL MATCH (e)-[:HAS_TAG]->(t:Tag) \
                 RETURN e.id AS id, collect(t.name) AS tags ORDER BY id",
            )
            .param("user", user),
            None => query(
                "MATCH (e:Evidence) \
                 OPTIONAL MATCH (e)-[:HAS_TAG]->(t:Tag) \
                 RETURN e.id AS id, collect(t.name) AS tags ORDER BY id",
            ),
        };

        let rows = self
            .client
            .query(q)
            .await
            .context("Failed to read evidence tags")?;
        rows.iter()
            .map(|row| {
                Ok(EvidenceTags {
                    id: column(row, "id")?,
                    tags: column(row, "tags")?,
                })
            })
            .collect()
    }

    async fn standards(&self) -> Result<Vec<(String, String)>> {
        let rows = self
            .client
            .query(query(
                "MATCH (s:Standard) RETURN s.id AS id, coalesce(s.name, '') AS name ORDER BY id",
            ))
            .await
            .context("Failed to list standards")?;
        rows.iter()
            .map(|row| Ok((column(row, "id")?, column(row, "name")?)))
            .collect()
    }

    async fn counts(&self) -> Result<GraphCounts> {
        let nodes: i64 = self
            .client
            .query_scalar(query("MATCH (n) RETURN count(n) AS count"), "count")
            .await?
            .unwrap_or(0);
        let relationships: i64 = self
            .client
            .query_scalar(query("MATCH ()-[r]->() RETURN count(r) AS count"), "count")
            .await?
            .unwrap_or(0);

        let rows = self
            .client
            .query(query(
                "MATCH (n) UNWIND labels(n) AS label RETURN label, count(*) AS count",
            ))
            .await?;
        let mut by_label = BTreeMap::new();
        for row in &rows {
            let label: String = column(row, "label")?;
            let count: i64 = column(row, "count")?;
            by_label.insert(label, count as usize);
        }

        Ok(GraphCounts {
            nodes: nodes as usize,
            relationships: relationships as usize,
            by_label,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_pattern_uses_closed_labels() {
        assert_eq!(
            edge_pattern(EdgeKind::UserEvidence, "a", "b"),
            "(a:User)-[r:UPLOADED]->(b:Evidence)"
        );
        assert_eq!(
            edge_pattern(EdgeKind::ControlStandard, "a", "b"),
            "(a:Control)-[r:BELONGS_TO]->(b:Standard)"
        );
    }
}
