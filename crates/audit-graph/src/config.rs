//! Synchronizer configuration.
//!
//! Values come from defaults, then an optional TOML file, then environment
//! variables; the binary applies its own flags last.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::client::GraphConfig;
use crate::error::SyncError;
use crate::model::EntityKind;
use crate::retry::RetryPolicy;

/// Configuration for the projection synchronizer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub graph: GraphConfig,
    pub database_path: PathBuf,
    /// Seconds between periodic reconciliation runs.
    pub reconcile_interval_secs: u64,
    /// Page size used when no per-kind size is set.
    pub batch_size: usize,
    pub batch_sizes: HashMap<EntityKind, usize>,
    /// Concurrent entity upserts inside one batch.
    pub workers: usize,
    pub op_timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub db_busy_timeout_ms: u64,
    /// Finished runs kept in memory for status queries.
    pub run_history: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            graph: GraphConfig::default(),
            database_path: PathBuf::from("audit.db"),
            reconcile_interval_secs: 300,
            batch_size: 500,
            batch_sizes: HashMap::new(),
            workers: 4,
            op_timeout_ms: 10_000,
            retry_attempts: 3,
            retry_base_delay_ms: 200,
            db_busy_timeout_ms: 5_000,
            run_history: 50,
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Load a TOML file, then apply the process environment.
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let mut config: SyncConfig = toml::from_str(&raw)
            .map_err(|e| SyncError::Config(format!("invalid {}: {}", path.display(), e)))?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    ///
    /// Unparseable numbers are ignored with a warning so a typo in one variable
    /// does not silently reset the others.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(uri) = lookup("NEO4J_URI") {
            self.graph.uri = uri;
        }
        if let Some(user) = lookup("NEO4J_USER") {
            self.graph.user = user;
        }
        if let Some(password) = lookup("NEO4J_PASSWORD") {
            self.graph.password = password;
        }
        if let Some(path) = lookup("AUDIT_DB_PATH") {
            self.database_path = PathBuf::from(path);
        }

        set_parsed(&lookup, "RECONCILE_INTERVAL_SECS", &mut self.reconcile_interval_secs);
        set_parsed(&lookup, "SYNC_BATCH_SIZE", &mut self.batch_size);
        set_parsed(&lookup, "SYNC_WORKERS", &mut self.workers);
        set_parsed(&lookup, "SYNC_OP_TIMEOUT_MS", &mut self.op_timeout_ms);
        set_parsed(&lookup, "SYNC_RETRY_ATTEMPTS", &mut self.retry_attempts);

        for kind in EntityKind::ALL {
            let key = format!("SYNC_BATCH_SIZE_{}", kind.as_str().to_uppercase());
            if let Some(raw) = lookup(&key) {
                match raw.parse::<usize>() {
                    Ok(size) => {
                        self.batch_sizes.insert(kind, size);
                    }
                    Err(_) => tracing::warn!(key = %key, value = %raw, "Ignoring invalid batch size"),
                }
            }
        }
    }

    /// Reject values the synchronizer cannot run with.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.graph.uri.trim().is_empty() {
            return Err(SyncError::Config("graph URI is empty".to_string()));
        }
        if self.batch_size == 0 || self.batch_sizes.values().any(|size| *size == 0) {
            return Err(SyncError::Config("batch size must be positive".to_string()));
        }
        if self.workers == 0 {
            return Err(SyncError::Config("worker count must be positive".to_string()));
        }
        if self.reconcile_interval_secs == 0 {
            return Err(SyncError::Config("reconcile interval must be positive".to_string()));
        }
        if self.retry_attempts == 0 {
            return Err(SyncError::Config("retry attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Page size for one entity kind.
    pub fn batch_size_for(&self, kind: EntityKind) -> usize {
        self.batch_sizes.get(&kind).copied().unwrap_or(self.batch_size)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn db_busy_timeout(&self) -> Duration {
        Duration::from_millis(self.db_busy_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            op_timeout: Duration::from_millis(self.op_timeout_ms),
        }
    }
}

fn set_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    if let Some(raw) = lookup(key) {
        match raw.parse() {
            Ok(value) => *target = value,
            Err(_) => tracing::warn!(key, value = %raw, "Ignoring invalid configuration value"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn env_overrides_defaults() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("NEO4J_URI", "bolt://graph:7687"),
            ("SYNC_BATCH_SIZE", "50"),
            ("SYNC_BATCH_SIZE_EVIDENCE", "10"),
            ("SYNC_WORKERS", "not-a-number"),
        ]);
        let mut config = SyncConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.graph.uri, "bolt://graph:7687");
        assert_eq!(config.batch_size_for(EntityKind::Tag), 50);
        assert_eq!(config.batch_size_for(EntityKind::Evidence), 10);
        assert_eq!(config.workers, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
reconcile_interval_secs = 60
workers = 2

[graph]
uri = "bolt://example:7687"
user = "sync"
password = "secret"

[batch_sizes]
control = 25
"#
        )
        .unwrap();

        let config = SyncConfig::load(file.path()).unwrap();
        assert_eq!(config.reconcile_interval(), Duration::from_secs(60));
        assert_eq!(config.workers, 2);
        assert_eq!(config.batch_size_for(EntityKind::Control), 25);
        assert_eq!(config.batch_size_for(EntityKind::User), 500);
    }

    #[test]
    fn zero_batch_size_is_a_config_error() {
        let config = SyncConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
    }
}
