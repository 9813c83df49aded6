//! CLI command definitions and handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use audit_graph::{EdgeKind, GraphClient, Neo4jStore, Scope, SyncConfig, SyncContext};

pub mod coverage;
pub mod graph;
pub mod serve;
pub mod sync;

/// Audit graph projection synchronizer
#[derive(Parser)]
#[command(name = "audit-sync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML configuration file; environment variables override it
    #[arg(short, long, global = true, env = "AUDIT_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the audit database
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the periodic reconciler and the HTTP API
    Serve(serve::ServeArgs),

    /// Run every stage once (build, heal-counters, gc, repair)
    Reconcile {
        /// all, or one entity kind (framework, control, tag, evidence, project, user)
        #[arg(default_value = "all")]
        scope: Scope,
    },

    /// Project authoritative rows into the graph
    Build {
        #[arg(default_value = "all")]
        scope: Scope,
    },

    /// Recompute stored evidence counters from explicit links
    HealCounters,

    /// Delete graph nodes whose authoritative row is gone
    Gc {
        #[arg(default_value = "all")]
        scope: Scope,
    },

    /// Hydrate partial nodes and fix structural edges
    Repair {
        #[arg(default_value = "all")]
        scope: Scope,

        /// Drop and recreate one relationship type from the database
        #[arg(long, value_name = "EDGE")]
        rebuild: Option<EdgeKind>,
    },

    /// Report drift between the database and the graph without changing either
    Verify {
        #[arg(default_value = "all")]
        scope: Scope,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show tag-based coverage of one standard
    Coverage {
        /// Standard (framework) id
        standard: String,

        /// Only count evidence uploaded by this user
        #[arg(long)]
        user: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show coverage of every standard for one user
    Projection {
        #[arg(long)]
        user: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create graph constraints and indexes
    Schema,

    /// Show graph node and relationship counts
    Status,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = load_config(self.config.as_deref(), self.db)?;

        match self.command {
            Commands::Serve(args) => serve::execute(args, config).await,
            Commands::Reconcile { scope } => sync::cmd_reconcile(&config, scope).await,
            Commands::Build { scope } => sync::cmd_build(&config, scope).await,
            Commands::HealCounters => sync::cmd_heal_counters(&config).await,
            Commands::Gc { scope } => sync::cmd_gc(&config, scope).await,
            Commands::Repair { scope, rebuild } => sync::cmd_repair(&config, scope, rebuild).await,
            Commands::Verify { scope, json } => sync::cmd_verify(&config, scope, json).await,
            Commands::Coverage { standard, user, json } => {
                coverage::cmd_coverage(&config, &standard, user.as_deref(), json).await
            }
            Commands::Projection { user, json } => {
                coverage::cmd_projection(&config, &user, json).await
            }
            Commands::Schema => graph::cmd_schema(&config).await,
            Commands::Status => graph::cmd_status(&config).await,
        }
    }
}

/// File (if any), then environment, then `--db`.
fn load_config(path: Option<&std::path::Path>, db: Option<PathBuf>) -> Result<SyncConfig> {
    let config = match path {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::from_env(),
    };
    apply_flags(config, db)
}

fn apply_flags(mut config: SyncConfig, db: Option<PathBuf>) -> Result<SyncConfig> {
    if let Some(db) = db {
        config.database_path = db;
    }
    config.validate()?;
    Ok(config)
}

/// Open both stores. Either being unreachable is fatal.
pub(crate) async fn open_context(config: &SyncConfig) -> Result<(SyncContext, GraphClient)> {
    let db = audit_db::init_pool(&config.database_path, config.db_busy_timeout())
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;
    let client = GraphClient::connect(&config.graph).await?;
    debug!(uri = %config.graph.uri, db = %config.database_path.display(), "Connected");

    let store = Arc::new(Neo4jStore::new(client.clone()));
    Ok((SyncContext::from_config(config, db, store), client))
}
