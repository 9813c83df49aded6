//! Reconciliation scheduler.
//!
//! A run executes the stages in order over one scope. At most one run per
//! overlapping scope is active; a trigger that collides with an active run is
//! dropped with a notice, since the next periodic run covers it. Cancellation
//! is observed only between stages.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};
use uuid::Uuid;

use crate::model::Scope;

use super::{builder, gc, orphans, tag_links, Stage, StageSummary, SyncContext};

pub type RunId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Completed,
    Failed,
}

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// A relational write that affects the projection.
    OnDemand,
    Periodic,
    /// An operator command.
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trigger::OnDemand => "on_demand",
            Trigger::Periodic => "periodic",
            Trigger::Manual => "manual",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub duration_ms: u64,
    pub summary: StageSummary,
}

/// Terminal summary of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub stages: Vec<StageReport>,
    pub totals: StageSummary,
}

impl RunReport {
    fn push(&mut self, stage: Stage, duration: Duration, summary: StageSummary) {
        self.totals.merge(summary.clone());
        self.stages.push(StageReport {
            stage,
            duration_ms: duration.as_millis() as u64,
            summary,
        });
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: RunId,
    pub scope: Scope,
    pub trigger: Trigger,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Why a run failed, e.g. `cancelled`.
    pub reason: Option<String>,
    pub report: Option<RunReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started(RunId),
    /// An overlapping run was active; this request was not queued.
    Dropped { active: RunId },
}

#[derive(Default)]
struct Registry {
    active: HashMap<RunId, Scope>,
    /// Oldest first; running records are updated in place.
    runs: VecDeque<RunRecord>,
}

impl Registry {
    fn record_mut(&mut self, id: RunId) -> Option<&mut RunRecord> {
        self.runs.iter_mut().find(|r| r.id == id)
    }

    fn trim(&mut self, limit: usize) {
        while self.runs.len() > limit {
            match self.runs.iter().position(|r| r.state != RunState::Running) {
                Some(index) => {
                    self.runs.remove(index);
                }
                None => break,
            }
        }
    }
}

/// Holds a scope claim; dropping it releases the scope on every exit path.
pub struct RunGuard {
    id: RunId,
    scope: Scope,
    trigger: Trigger,
    registry: Arc<Mutex<Registry>>,
}

impl RunGuard {
    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry.active.remove(&self.id);
        if let Some(record) = registry.record_mut(self.id) {
            if record.state == RunState::Running {
                record.state = RunState::Failed;
                record.finished_at = Some(Utc::now());
                record.reason = Some("aborted".to_string());
            }
        }
    }
}

/// Drives reconciliation runs and keeps their records.
#[derive(Clone)]
pub struct Reconciler {
    ctx: SyncContext,
    registry: Arc<Mutex<Registry>>,
    history_limit: usize,
    shutdown: CancellationToken,
    /// Background runs started by [`Reconciler::trigger`].
    tasks: TaskTracker,
}

impl Reconciler {
    pub fn new(ctx: SyncContext, history_limit: usize) -> Self {
        Self {
            ctx,
            registry: Arc::new(Mutex::new(Registry::default())),
            history_limit: history_limit.max(1),
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `scope` for a new run, or return the id of the run blocking it.
    pub fn claim(&self, scope: Scope, trigger: Trigger) -> Result<RunGuard, RunId> {
        let mut registry = self.registry();
        if let Some((active, _)) = registry.active.iter().find(|(_, s)| s.overlaps(&scope)) {
            return Err(*active);
        }

        let id = Uuid::new_v4();
        registry.active.insert(id, scope);
        registry.runs.push_back(RunRecord {
            id,
            scope,
            trigger,
            state: RunState::Running,
            started_at: Utc::now(),
            finished_at: None,
            reason: None,
            report: None,
        });
        registry.trim(self.history_limit);

        Ok(RunGuard {
            id,
            scope,
            trigger,
            registry: Arc::clone(&self.registry),
        })
    }

    /// Start a background run for `scope` unless an overlapping run is active.
    pub fn trigger(&self, scope: Scope, trigger: Trigger) -> TriggerOutcome {
        match self.claim(scope, trigger) {
            Ok(guard) => {
                let id = guard.id();
                let this = self.clone();
                let cancel = self.shutdown.child_token();
                info!(run_id = %id, scope = %scope, trigger = %trigger, "Reconciliation started");
                self.tasks.spawn(async move {
                    this.execute(guard, cancel).await;
                });
                TriggerOutcome::Started(id)
            }
            Err(active) => {
                warn!(
                    scope = %scope,
                    trigger = %trigger,
                    active_run = %active,
                    "Reconciliation already running for overlapping scope; dropping request"
                );
                TriggerOutcome::Dropped { active }
            }
        }
    }

    /// Run inline and return the finished record.
    pub async fn run(
        &self,
        scope: Scope,
        trigger: Trigger,
        cancel: CancellationToken,
    ) -> Result<RunRecord, RunId> {
        let guard = self.claim(scope, trigger)?;
        Ok(self.execute(guard, cancel).await)
    }

    /// Trigger a full run every `interval` until `cancel` fires. Missed ticks
    /// are skipped, and a tick while a run is active is dropped.
    pub async fn run_periodic(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = interval.as_secs(), "Periodic reconciliation started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.claim(Scope::All, Trigger::Periodic) {
                        Ok(guard) => {
                            let record = self.execute(guard, cancel.child_token()).await;
                            info!(run_id = %record.id, state = ?record.state, "Periodic reconciliation finished");
                        }
                        Err(active) => {
                            warn!(active_run = %active, "Skipping periodic reconciliation; a run is active");
                        }
                    }
                }
            }
        }

        info!("Periodic reconciliation stopped");
    }

    /// Cancel every background run at its next stage boundary.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Wait until every background run has returned its scope.
    pub async fn wait_background(&self) {
        self.tasks.close();
        self.tasks.wait().await;
    }

    pub fn get(&self, id: RunId) -> Option<RunRecord> {
        self.registry().runs.iter().find(|r| r.id == id).cloned()
    }

    /// Known runs, newest first.
    pub fn runs(&self) -> Vec<RunRecord> {
        self.registry().runs.iter().rev().cloned().collect()
    }

    /// Active runs and their scopes.
    pub fn active(&self) -> Vec<(RunId, Scope)> {
        self.registry()
            .active
            .iter()
            .map(|(id, scope)| (*id, *scope))
            .collect()
    }

    async fn execute(&self, guard: RunGuard, cancel: CancellationToken) -> RunRecord {
        let id = guard.id();
        let scope = guard.scope();
        let started = Instant::now();
        let mut report = RunReport::default();
        let mut reason = None;

        for stage in Stage::ORDER {
            if cancel.is_cancelled() {
                reason = Some("cancelled".to_string());
                break;
            }
            if !stage_applies(stage, scope) {
                continue;
            }

            let stage_started = Instant::now();
            let summary = match stage {
                Stage::Build => builder::build(&self.ctx, scope).await,
                Stage::HealCounters => tag_links::heal_counters(&self.ctx).await,
                Stage::Collect => gc::collect(&self.ctx, scope).await,
                Stage::Repair => orphans::repair(&self.ctx, scope).await,
            };
            info!(
                run_id = %id,
                stage = %stage,
                failures = summary.failures.len(),
                "Stage finished"
            );
            report.push(stage, stage_started.elapsed(), summary);
        }

        let state = if reason.is_some() {
            RunState::Failed
        } else {
            RunState::Completed
        };
        let totals = &report.totals;
        info!(
            run_id = %id,
            scope = %scope,
            state = ?state,
            elapsed_ms = started.elapsed().as_millis() as u64,
            upserted = totals.upserted,
            deleted = totals.deleted_count(),
            repaired = totals.edges_repaired + totals.hydrated,
            counters_healed = totals.counters_healed,
            failures = totals.failures.len(),
            "Reconciliation finished"
        );

        let record = {
            let mut registry = self.registry();
            match registry.record_mut(id) {
                Some(record) => {
                    record.state = state;
                    record.finished_at = Some(Utc::now());
                    record.reason = reason;
                    record.report = Some(report);
                    record.clone()
                }
                None => RunRecord {
                    id,
                    scope,
                    trigger: guard.trigger,
                    state,
                    started_at: Utc::now(),
                    finished_at: Some(Utc::now()),
                    reason,
                    report: Some(report),
                },
            }
        };
        drop(guard);
        record
    }
}

fn stage_applies(stage: Stage, scope: Scope) -> bool {
    match stage {
        Stage::HealCounters => scope.heals_counters(),
        Stage::Build | Stage::Collect | Stage::Repair => !scope.kinds().is_empty(),
    }
}
