//! Authoritative relational store for audit data.
//!
//! Frameworks, controls, tags, evidence, projects, project controls and users
//! live here. The graph projection reads this store and never the reverse; the
//! only write it issues is the evidence-counter update in
//! [`queries::project_controls::update_evidence_count`].

pub mod migrations;
pub mod pool;
pub mod queries;

pub use pool::{DbError, DbPool, DbResult};

use std::path::Path;
use std::time::Duration;

/// Open a database file and bring its schema up to date.
pub fn init_pool(path: impl AsRef<Path>, busy_timeout: Duration) -> DbResult<DbPool> {
    let path = path.as_ref();
    let pool = DbPool::open_with_timeout(path, busy_timeout)?;
    migrations::run_migrations(&pool)?;
    tracing::debug!(path = %path.display(), "Audit database ready");
    Ok(pool)
}

/// Open a migrated in-memory database.
pub fn init_in_memory() -> DbResult<DbPool> {
    let pool = DbPool::in_memory()?;
    migrations::run_migrations(&pool)?;
    Ok(pool)
}

#[cfg(test)]
mod tests;
