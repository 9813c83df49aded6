//! Pipeline stage commands.

use anyhow::{bail, Result};
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use audit_graph::sync::{builder, drift, gc, orphans, tag_links};
use audit_graph::{EdgeKind, Reconciler, RunState, Scope, SyncConfig, Trigger};

use super::open_context;
use crate::output;

/// Run every stage inline. Ctrl+C stops the run at the next stage boundary.
pub async fn cmd_reconcile(config: &SyncConfig, scope: Scope) -> Result<()> {
    let (ctx, _) = open_context(config).await?;
    let reconciler = Reconciler::new(ctx, config.run_history);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    println!("{} {}", "Reconciling".bold(), scope.to_string().cyan());
    let record = match reconciler.run(scope, Trigger::Manual, cancel).await {
        Ok(record) => record,
        Err(active) => bail!("run {active} already holds an overlapping scope"),
    };

    output::print_run(&record);
    if record.state == RunState::Failed {
        bail!(
            "reconciliation {}",
            record.reason.as_deref().unwrap_or("failed")
        );
    }
    Ok(())
}

pub async fn cmd_build(config: &SyncConfig, scope: Scope) -> Result<()> {
    let (ctx, _) = open_context(config).await?;
    println!("{} {}", "Building projection for".bold(), scope.to_string().cyan());

    let summary = builder::build(&ctx, scope).await;
    output::print_summary("Build", &summary);
    Ok(())
}

pub async fn cmd_heal_counters(config: &SyncConfig) -> Result<()> {
    let (ctx, _) = open_context(config).await?;
    println!("{}", "Healing evidence counters...".bold());

    let summary = tag_links::heal_counters(&ctx).await;
    output::print_summary("Counter healing", &summary);
    Ok(())
}

pub async fn cmd_gc(config: &SyncConfig, scope: Scope) -> Result<()> {
    let (ctx, _) = open_context(config).await?;
    println!("{} {}", "Collecting stale nodes for".bold(), scope.to_string().cyan());

    let summary = gc::collect(&ctx, scope).await;
    output::print_summary("Garbage collection", &summary);
    for (kind, ids) in &summary.deleted {
        println!("  {} {}: {}", "-".red(), kind, ids.join(", ").dimmed());
    }
    Ok(())
}

pub async fn cmd_repair(config: &SyncConfig, scope: Scope, rebuild: Option<EdgeKind>) -> Result<()> {
    let (ctx, _) = open_context(config).await?;

    let summary = match rebuild {
        Some(edge) => {
            println!("{} {}", "Rebuilding".bold(), edge.to_string().yellow());
            orphans::rebuild_edges(&ctx, edge).await
        }
        None => {
            println!("{} {}", "Repairing".bold(), scope.to_string().cyan());
            orphans::repair(&ctx, scope).await
        }
    };

    output::print_summary("Repair", &summary);
    for node in &summary.irreparable {
        println!(
            "  {} {} {} {}",
            "!".yellow(),
            node.kind,
            node.id,
            "(no authoritative row; left for gc)".dimmed()
        );
    }
    Ok(())
}

/// Exits non-zero when any drift is found.
pub async fn cmd_verify(config: &SyncConfig, scope: Scope, json: bool) -> Result<()> {
    let (ctx, _) = open_context(config).await?;
    let report = drift::measure_drift(&ctx, scope).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::print_drift(&report);
    }

    if !report.is_clean() {
        bail!("{} discrepancies found", report.total());
    }
    Ok(())
}
