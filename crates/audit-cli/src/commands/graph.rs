//! Graph maintenance commands.

use anyhow::Result;
use colored::Colorize;

use audit_graph::schema;
use audit_graph::{GraphStore, SyncConfig};

use super::open_context;

/// Create uniqueness constraints and indexes.
pub async fn cmd_schema(config: &SyncConfig) -> Result<()> {
    let (_, client) = open_context(config).await?;
    println!("{}", "Initializing graph schema...".bold());

    let applied = schema::initialize_schema(&client).await?;
    println!("{} {} statements applied", "✓".green(), applied);
    Ok(())
}

/// Show graph status (node and relationship counts).
pub async fn cmd_status(config: &SyncConfig) -> Result<()> {
    let (ctx, _) = open_context(config).await?;
    let counts = ctx.graph.counts().await?;

    println!("{}", "Audit Graph Status".bold());
    println!("{}", "─".repeat(40));
    println!("  Nodes:         {}", counts.nodes.to_string().cyan());
    println!("  Relationships: {}", counts.relationships.to_string().cyan());
    for (label, count) in &counts.by_label {
        println!("    {:<12} {}", label, count.to_string().dimmed());
    }
    println!("{}", "─".repeat(40));
    Ok(())
}
