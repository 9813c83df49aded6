//! Application state.

use std::sync::Arc;

use audit_graph::{GraphStore, Reconciler, SyncContext};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub reconciler: Reconciler,
}

impl AppState {
    pub fn new(reconciler: Reconciler) -> Self {
        Self { reconciler }
    }

    pub fn context(&self) -> &SyncContext {
        self.reconciler.context()
    }

    pub fn graph(&self) -> &Arc<dyn GraphStore> {
        &self.reconciler.context().graph
    }
}
