//! Neo4j schema initialization.

use anyhow::Result;
use neo4rs::Query;
use tracing::info;

use crate::client::GraphClient;
use crate::model::EntityKind;

/// One uniqueness constraint on `id` per mirrored label, plus a lookup
/// index for tag names used by coverage matching.
pub fn schema_statements() -> Vec<String> {
    let mut statements: Vec<String> = EntityKind::ALL
        .iter()
        .map(|kind| {
            format!(
                "CREATE CONSTRAINT {}_id IF NOT EXISTS FOR (n:{}) REQUIRE n.id IS UNIQUE",
                kind.as_str(),
                kind.label()
            )
        })
        .collect();
    statements.push("CREATE INDEX tag_name IF NOT EXISTS FOR (t:Tag) ON (t.name)".to_string());
    statements
}

/// Create constraints and indexes. Safe to run repeatedly.
pub async fn initialize_schema(client: &GraphClient) -> Result<usize> {
    info!("Initializing Neo4j schema...");

    let statements = schema_statements();
    for statement in &statements {
        client.execute(Query::new(statement.clone())).await?;
    }

    info!("Neo4j schema initialized ({} statements)", statements.len());
    Ok(statements.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_label_gets_a_uniqueness_constraint() {
        let statements = schema_statements();
        for kind in EntityKind::ALL {
            let label = format!("(n:{})", kind.label());
            assert!(statements.iter().any(|s| s.contains(&label) && s.contains("IS UNIQUE")));
        }
    }
}
