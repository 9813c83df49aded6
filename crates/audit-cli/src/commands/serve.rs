//! Daemon command: periodic reconciliation plus the HTTP API.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use audit_graph::{Reconciler, SyncConfig};

use super::open_context;

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(long, default_value = "3030")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Seconds between periodic runs (overrides RECONCILE_INTERVAL_SECS)
    #[arg(long)]
    pub interval: Option<u64>,

    /// Also write logs to a file
    #[arg(long)]
    pub log: bool,

    /// Log file path (default: logs/audit-sync.log)
    #[arg(long, requires = "log")]
    pub log_file: Option<PathBuf>,
}

pub async fn execute(args: ServeArgs, mut config: SyncConfig) -> Result<()> {
    if let Some(secs) = args.interval {
        config.reconcile_interval_secs = secs;
        config.validate()?;
    }
    let (ctx, _) = open_context(&config).await?;
    let reconciler = Reconciler::new(ctx, config.run_history);
    let shutdown = CancellationToken::new();

    println!();
    println!("  {} {}", "audit-sync".cyan().bold(), "Reconciler".bold());
    println!();
    println!("  {}       http://{}:{}/api", "API".green(), args.host, args.port);
    println!(
        "  {}  every {}s",
        "Periodic".green(),
        config.reconcile_interval_secs
    );
    println!();
    println!("  {}", "Ctrl+C to stop".dimmed());
    println!();

    let periodic = {
        let reconciler = reconciler.clone();
        let cancel = shutdown.child_token();
        let interval = config.reconcile_interval();
        tokio::spawn(async move { reconciler.run_periodic(interval, cancel).await })
    };

    let on_signal = shutdown.clone();
    let signal_reconciler = reconciler.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            signal_reconciler.shutdown();
            on_signal.cancel();
        }
    });

    let served =
        audit_web::run_server(reconciler.clone(), &args.host, args.port, shutdown.clone()).await;
    shutdown.cancel();
    reconciler.shutdown();
    if let Err(e) = periodic.await {
        warn!(error = %e, "Periodic reconciler task ended abnormally");
    }
    reconciler.wait_background().await;
    info!("Background runs drained");
    served
}
