//! Coverage query commands.

use anyhow::Result;
use colored::Colorize;

use audit_graph::queries;
use audit_graph::SyncConfig;

use super::open_context;
use crate::output;

pub async fn cmd_coverage(
    config: &SyncConfig,
    standard: &str,
    user: Option<&str>,
    json: bool,
) -> Result<()> {
    let (ctx, _) = open_context(config).await?;
    let controls = queries::control_coverage(ctx.graph.as_ref(), standard, user).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&controls)?);
        return Ok(());
    }

    let scope = user.map(|u| format!(" for {u}")).unwrap_or_default();
    println!("{} {}{}", "Coverage of".bold(), standard.cyan(), scope);
    println!("{}", "─".repeat(70));
    output::print_coverage_table(&controls);
    Ok(())
}

pub async fn cmd_projection(config: &SyncConfig, user: &str, json: bool) -> Result<()> {
    let (ctx, _) = open_context(config).await?;
    let rows = queries::projection(ctx.graph.as_ref(), user).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{} {}", "Compliance projection for".bold(), user.cyan());
    println!("{}", "─".repeat(60));
    output::print_projection(&rows);
    Ok(())
}
