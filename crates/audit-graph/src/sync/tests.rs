//! Pipeline scenarios against an in-memory database and graph.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use audit_db::queries::projects::NewProject;
use audit_db::queries::{controls, evidence, frameworks, project_controls, projects, tags, users};
use audit_db::{init_in_memory, DbPool};

use crate::error::FailureClass;
use crate::memory::MemoryGraph;
use crate::model::{EdgeKind, EntityKind, Scope};
use crate::queries::coverage::{control_coverage, coverage_summary};
use crate::retry::RetryPolicy;
use crate::store::GraphStore;

use super::scheduler::{Reconciler, RunState, Trigger, TriggerOutcome};
use super::{builder, drift, gc, orphans, tag_links, SyncContext};

struct Fixture {
    db: DbPool,
    graph: Arc<MemoryGraph>,
    ctx: SyncContext,
}

/// Two frameworks, a tagged control under each, two customers with one piece
/// of evidence each, and an auditor on the project.
fn fixture() -> Fixture {
    let db = init_in_memory().unwrap();

    frameworks::create_framework(&db, "f1", "ISO 27001").unwrap();
    frameworks::create_framework(&db, "f2", "SOC 2").unwrap();
    controls::create_control(&db, "c1", Some("f1"), "A.5.1", "Policies").unwrap();
    controls::create_control(&db, "c2", Some("f2"), "CC6.1", "Logical access").unwrap();

    tags::create_tag(&db, "t-policy", "Policy").unwrap();
    tags::create_tag(&db, "t-access", "Access").unwrap();
    tags::create_tag(&db, "t-policy-lc", "policy").unwrap();
    tags::create_tag(&db, "t-network", "network").unwrap();
    controls::add_control_tag(&db, "c1", "t-policy").unwrap();
    controls::add_control_tag(&db, "c1", "t-access").unwrap();
    controls::add_control_tag(&db, "c2", "t-network").unwrap();

    users::create_user(&db, "u1", "alice@example.com", "customer").unwrap();
    users::create_user(&db, "u2", "bob@example.com", "customer").unwrap();
    users::create_user(&db, "u3", "carol@example.com", "auditor").unwrap();
    projects::create_project(
        &db,
        &NewProject {
            id: "p1",
            name: "Acme ISO",
            framework_id: Some("f1"),
            auditor_id: Some("u3"),
            customer_id: Some("u1"),
            ..Default::default()
        },
    )
    .unwrap();

    evidence::create_evidence(&db, "e1", "policy.pdf", Some("p1"), Some("u1")).unwrap();
    evidence::add_evidence_tag(&db, "e1", "t-policy-lc").unwrap();
    evidence::create_evidence(&db, "e2", "firewall.png", Some("p1"), Some("u2")).unwrap();
    evidence::add_evidence_tag(&db, "e2", "t-network").unwrap();

    let graph = Arc::new(MemoryGraph::new());
    let mut ctx = SyncContext::new(db.clone(), graph.clone());
    ctx.retry = RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_millis(1),
        op_timeout: Duration::from_secs(1),
    };
    ctx.batch_size = 2;

    Fixture { db, graph, ctx }
}

/// Every node with its attributes and every edge, in a stable order.
async fn graph_state(graph: &MemoryGraph) -> Vec<String> {
    let mut state = Vec::new();
    for kind in EntityKind::ALL {
        for key in graph.node_keys(kind).await.unwrap() {
            let attrs = graph.node_attrs(kind, &key).await.unwrap();
            state.push(format!("{kind}:{key}:{attrs:?}"));
        }
    }
    for edge in EdgeKind::ALL {
        for (from, to) in graph.edges_of(edge).await {
            state.push(format!("{edge}:{from}->{to}"));
        }
    }
    state
}

async fn build_all(fx: &Fixture) {
    let summary = builder::build(&fx.ctx, Scope::All).await;
    assert!(summary.failures.is_empty(), "{:?}", summary.failures);
}

// ─── Builder ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn build_is_idempotent() {
    let fx = fixture();

    let first = builder::build(&fx.ctx, Scope::All).await;
    assert_eq!(first.upserted, 14);
    assert!(first.failures.is_empty());
    let after_first = graph_state(&fx.graph).await;

    let second = builder::build(&fx.ctx, Scope::All).await;
    assert_eq!(second.upserted, 14);
    assert_eq!(second.edges_created, 0);
    assert_eq!(graph_state(&fx.graph).await, after_first);
}

#[tokio::test]
async fn build_projects_structural_edges() {
    let fx = fixture();
    build_all(&fx).await;

    assert_eq!(
        fx.graph.edges_of(EdgeKind::UserEvidence).await,
        vec![
            ("u1".to_string(), "e1".to_string()),
            ("u2".to_string(), "e2".to_string())
        ]
    );
    assert_eq!(
        fx.graph.edges_of(EdgeKind::ProjectAuditor).await,
        vec![("u3".to_string(), "p1".to_string())]
    );
    let standard = fx
        .graph
        .node_attrs(EntityKind::Framework, "f1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(standard.get("name").map(String::as_str), Some("ISO 27001"));
    assert!(fx.graph.unhydrated_keys(EntityKind::Tag).await.unwrap().is_empty());
}

#[tokio::test]
async fn failing_entity_does_not_abort_batch() {
    let fx = fixture();
    // More failures than retry attempts.
    fx.graph.inject_fault("t-access", 5);

    let summary = builder::build(&fx.ctx, Scope::Entity(EntityKind::Tag)).await;

    assert_eq!(summary.upserted, 3);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].id, "t-access");
    assert_eq!(summary.failures[0].class, FailureClass::Transient);
    assert!(fx.graph.contains_node(EntityKind::Tag, "t-network").await);
}

#[tokio::test]
async fn transient_fault_is_retried_per_operation() {
    let fx = fixture();
    fx.graph.inject_fault("t-access", 1);

    let summary = builder::build(&fx.ctx, Scope::Entity(EntityKind::Tag)).await;

    assert_eq!(summary.upserted, 4);
    assert!(summary.failures.is_empty());
}

#[tokio::test]
async fn row_missing_required_field_is_a_data_failure() {
    let fx = fixture();
    evidence::create_evidence(&fx.db, "e3", "orphan.pdf", Some("p1"), None).unwrap();

    let summary = builder::build(&fx.ctx, Scope::Entity(EntityKind::Evidence)).await;

    assert_eq!(summary.upserted, 2);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].class, FailureClass::Data);
    assert!(!fx.graph.contains_node(EntityKind::Evidence, "e3").await);
}

#[tokio::test]
async fn conflicting_single_edge_raises_integrity_alert() {
    let fx = fixture();
    fx.graph
        .merge_edge(EdgeKind::EvidenceProject, "e1", "p-old")
        .await
        .unwrap();

    let summary = builder::build(&fx.ctx, Scope::Entity(EntityKind::Evidence)).await;

    assert_eq!(summary.integrity_alerts, 1);
    // The authoritative edge is merged; the stale one waits for the repairer.
    let targets = fx
        .graph
        .edge_targets(EdgeKind::EvidenceProject, "e1")
        .await
        .unwrap();
    assert_eq!(targets, vec!["p-old".to_string(), "p1".to_string()]);
}

// ─── Tag links and counters ──────────────────────────────────────────────────

#[tokio::test]
async fn tag_coverage_is_case_insensitive_and_scoped_to_uploader() {
    let fx = fixture();
    build_all(&fx).await;

    let u1 = coverage_summary(fx.graph.as_ref(), "f1", Some("u1")).await.unwrap();
    assert_eq!((u1.covered, u1.total), (1, 1));

    let u2 = coverage_summary(fx.graph.as_ref(), "f1", Some("u2")).await.unwrap();
    assert_eq!((u2.covered, u2.total), (0, 1));

    let set = tag_links::coverage_set(fx.graph.as_ref(), "c1", None).await.unwrap();
    assert_eq!(set, vec!["e1".to_string()]);
}

#[tokio::test]
async fn user_without_evidence_has_zero_coverage() {
    let fx = fixture();
    build_all(&fx).await;

    let summary = coverage_summary(fx.graph.as_ref(), "f1", Some("u3")).await.unwrap();
    assert_eq!((summary.covered, summary.total), (0, 1));

    let unknown = coverage_summary(fx.graph.as_ref(), "f-none", Some("u1")).await.unwrap();
    assert_eq!((unknown.covered, unknown.total), (0, 0));
}

#[tokio::test]
async fn adding_a_shared_tag_never_decreases_coverage() {
    let fx = fixture();
    build_all(&fx).await;
    let before = control_coverage(fx.graph.as_ref(), "f1", None).await.unwrap();

    evidence::add_evidence_tag(&fx.db, "e2", "t-access").unwrap();
    build_all(&fx).await;
    let after = control_coverage(fx.graph.as_ref(), "f1", None).await.unwrap();

    assert_eq!(before[0].evidence_total, 1);
    assert_eq!(after[0].evidence_total, 2);
    assert!(after[0].evidence_in_scope >= before[0].evidence_in_scope);
}

#[tokio::test]
async fn counter_healing_counts_explicit_links() {
    let fx = fixture();
    evidence::create_evidence(&fx.db, "e3", "log.txt", Some("p1"), Some("u1")).unwrap();
    project_controls::create_project_control(&fx.db, "pc1", "p1", "c1", 1).unwrap();
    project_controls::create_project_control(&fx.db, "pc2", "p1", "c2", 0).unwrap();
    for id in ["e1", "e2", "e3"] {
        evidence::link_project_control(&fx.db, id, "pc1").unwrap();
    }

    let summary = tag_links::heal_counters(&fx.ctx).await;
    assert_eq!(summary.counters_healed, 1);
    let pc1 = project_controls::get_project_control(&fx.db, "pc1").unwrap().unwrap();
    assert_eq!(pc1.evidence_count, 3);

    // Already correct: nothing is written.
    let again = tag_links::heal_counters(&fx.ctx).await;
    assert_eq!(again.counters_healed, 0);
}

// ─── Garbage collection ──────────────────────────────────────────────────────

#[tokio::test]
async fn gc_removes_deleted_framework_and_its_controls() {
    let fx = fixture();
    build_all(&fx).await;

    frameworks::delete_framework(&fx.db, "f1").unwrap();
    let summary = gc::collect(&fx.ctx, Scope::All).await;

    assert_eq!(summary.deleted.get(&EntityKind::Framework), Some(&vec!["f1".to_string()]));
    assert_eq!(summary.deleted.get(&EntityKind::Control), Some(&vec!["c1".to_string()]));
    assert!(!fx.graph.contains_node(EntityKind::Framework, "f1").await);
    assert!(!fx.graph.contains_node(EntityKind::Control, "c1").await);
    assert!(fx.graph.contains_node(EntityKind::Control, "c2").await);
    assert_eq!(
        fx.graph.edges_of(EdgeKind::ControlStandard).await,
        vec![("c2".to_string(), "f2".to_string())]
    );
    assert!(fx
        .graph
        .edges_of(EdgeKind::ControlTag)
        .await
        .iter()
        .all(|(control, _)| control == "c2"));
}

#[tokio::test]
async fn gc_rechecks_rows_before_deleting() {
    let fx = fixture();
    build_all(&fx).await;
    fx.graph
        .upsert_node(EntityKind::Framework, "f9", &Default::default())
        .await
        .unwrap();

    let plan = gc::plan(&fx.ctx, EntityKind::Framework).await.unwrap();
    assert!(plan.stale.contains("f9"));

    // The row appears between the snapshot and the delete.
    frameworks::create_framework(&fx.db, "f9", "NIST").unwrap();
    let summary = gc::apply(&fx.ctx, &plan).await;

    assert_eq!(summary.deleted_count(), 0);
    assert!(fx.graph.contains_node(EntityKind::Framework, "f9").await);
}

#[tokio::test]
async fn gc_leaves_only_backed_nodes() {
    let fx = fixture();
    build_all(&fx).await;
    users::delete_user(&fx.db, "u2").unwrap();
    tags::delete_tag(&fx.db, "t-network").unwrap();

    gc::collect(&fx.ctx, Scope::All).await;

    let reader = super::reader::EntityReader::new(fx.db.clone());
    for kind in EntityKind::ALL {
        let authoritative = reader.ids(kind).unwrap();
        for key in fx.graph.node_keys(kind).await.unwrap() {
            assert!(authoritative.contains(&key), "{kind} {key} survived");
        }
    }
}

// ─── Orphan repair ───────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_uploaded_edge_is_recreated_once() {
    let fx = fixture();
    build_all(&fx).await;
    fx.graph
        .delete_edge(EdgeKind::UserEvidence, "u1", "e1")
        .await
        .unwrap();

    let summary = orphans::repair(&fx.ctx, Scope::All).await;
    assert_eq!(summary.edges_repaired, 1);

    orphans::repair(&fx.ctx, Scope::All).await;
    let sources = fx
        .graph
        .edge_sources(EdgeKind::UserEvidence, "e1")
        .await
        .unwrap();
    assert_eq!(sources, vec!["u1".to_string()]);
}

#[tokio::test]
async fn excess_required_edge_is_removed() {
    let fx = fixture();
    build_all(&fx).await;
    fx.graph
        .merge_edge(EdgeKind::EvidenceProject, "e1", "p-old")
        .await
        .unwrap();

    let summary = orphans::repair(&fx.ctx, Scope::Entity(EntityKind::Evidence)).await;

    assert_eq!(summary.edges_removed, 1);
    assert_eq!(
        fx.graph
            .edge_targets(EdgeKind::EvidenceProject, "e1")
            .await
            .unwrap(),
        vec!["p1".to_string()]
    );
}

#[tokio::test]
async fn required_edge_without_backing_column_is_removed() {
    let fx = fixture();
    build_all(&fx).await;
    evidence::set_uploader(&fx.db, "e1", None).unwrap();

    let reconciler = Reconciler::new(fx.ctx.clone(), 10);
    for _ in 0..2 {
        let record = reconciler
            .run(Scope::All, Trigger::Manual, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(record.state, RunState::Completed);
    }

    assert_eq!(
        fx.graph.edges_of(EdgeKind::UserEvidence).await,
        vec![("u2".to_string(), "e2".to_string())]
    );
    let u1 = coverage_summary(fx.graph.as_ref(), "f1", Some("u1")).await.unwrap();
    assert_eq!((u1.covered, u1.total), (0, 1));

    let report = drift::measure_drift(&fx.ctx, Scope::All).await.unwrap();
    let uploads = report
        .edges
        .iter()
        .find(|e| e.edge == EdgeKind::UserEvidence)
        .unwrap();
    assert!(uploads.excess.is_empty());
}

#[tokio::test]
async fn partial_nodes_are_hydrated_or_flagged() {
    let fx = fixture();
    fx.graph
        .merge_edge(EdgeKind::UserEvidence, "u1", "e1")
        .await
        .unwrap();
    fx.graph.insert_partial_node(EntityKind::User, "ghost").await;

    let summary = orphans::hydrate(&fx.ctx, EntityKind::User).await;

    assert_eq!(summary.hydrated, 1);
    assert_eq!(summary.irreparable.len(), 1);
    assert_eq!(summary.irreparable[0].id, "ghost");
    let u1 = fx
        .graph
        .node_attrs(EntityKind::User, "u1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(u1.get("email").map(String::as_str), Some("alice@example.com"));

    // The collector removes what the repairer could not.
    gc::collect(&fx.ctx, Scope::Entity(EntityKind::User)).await;
    assert!(!fx.graph.contains_node(EntityKind::User, "ghost").await);
}

#[tokio::test]
async fn stale_many_to_many_edges_are_pruned() {
    let fx = fixture();
    build_all(&fx).await;
    fx.graph
        .merge_edge(EdgeKind::ControlTag, "c1", "t-network")
        .await
        .unwrap();

    let summary = orphans::repair(&fx.ctx, Scope::Entity(EntityKind::Control)).await;

    assert_eq!(summary.edges_removed, 1);
    let tags = fx.graph.edge_targets(EdgeKind::ControlTag, "c1").await.unwrap();
    assert_eq!(tags, vec!["t-access".to_string(), "t-policy".to_string()]);
}

#[tokio::test]
async fn rebuild_recreates_relationship_from_rows() {
    let fx = fixture();
    build_all(&fx).await;
    fx.graph
        .merge_edge(EdgeKind::EvidenceTag, "e1", "t-network")
        .await
        .unwrap();
    fx.graph
        .delete_edge(EdgeKind::EvidenceTag, "e2", "t-network")
        .await
        .unwrap();

    let summary = orphans::rebuild_edges(&fx.ctx, EdgeKind::EvidenceTag).await;

    assert_eq!(summary.edges_removed, 2);
    assert_eq!(summary.edges_created, 2);
    assert_eq!(
        fx.graph.edges_of(EdgeKind::EvidenceTag).await,
        vec![
            ("e1".to_string(), "t-policy-lc".to_string()),
            ("e2".to_string(), "t-network".to_string())
        ]
    );
}

// ─── Drift ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn drift_is_reported_without_writing() {
    let fx = fixture();
    build_all(&fx).await;
    assert!(drift::measure_drift(&fx.ctx, Scope::All).await.unwrap().is_clean());

    fx.graph
        .delete_edge(EdgeKind::UserEvidence, "u2", "e2")
        .await
        .unwrap();
    frameworks::create_framework(&fx.db, "f3", "PCI").unwrap();
    project_controls::create_project_control(&fx.db, "pc1", "p1", "c1", 4).unwrap();

    let before = graph_state(&fx.graph).await;
    let report = drift::measure_drift(&fx.ctx, Scope::All).await.unwrap();

    assert_eq!(report.total(), 3);
    let standards = report
        .nodes
        .iter()
        .find(|n| n.kind == EntityKind::Framework)
        .unwrap();
    assert_eq!(standards.missing, vec!["f3".to_string()]);
    let uploads = report
        .edges
        .iter()
        .find(|e| e.edge == EdgeKind::UserEvidence)
        .unwrap();
    assert_eq!(uploads.missing, vec![("u2".to_string(), "e2".to_string())]);
    assert_eq!(report.counters[0].actual, 0);
    assert_eq!(graph_state(&fx.graph).await, before);
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_heals_drift() {
    let fx = fixture();
    project_controls::create_project_control(&fx.db, "pc1", "p1", "c1", 2).unwrap();
    evidence::link_project_control(&fx.db, "e1", "pc1").unwrap();
    fx.graph
        .upsert_node(EntityKind::Tag, "t-gone", &Default::default())
        .await
        .unwrap();

    let reconciler = Reconciler::new(fx.ctx.clone(), 10);
    let record = reconciler
        .run(Scope::All, Trigger::Manual, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(record.state, RunState::Completed);
    let report = record.report.unwrap();
    assert_eq!(report.stages.len(), 4);
    assert_eq!(report.totals.counters_healed, 1);
    assert_eq!(report.totals.deleted_count(), 1);
    assert!(report.totals.failures.is_empty());
    assert!(drift::measure_drift(&fx.ctx, Scope::All).await.unwrap().is_clean());
    assert!(reconciler.active().is_empty());
    assert_eq!(reconciler.get(record.id).unwrap().state, RunState::Completed);
}

#[tokio::test]
async fn cancelled_run_stops_at_stage_boundary() {
    let fx = fixture();
    let reconciler = Reconciler::new(fx.ctx.clone(), 10);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let record = reconciler
        .run(Scope::All, Trigger::Manual, cancel)
        .await
        .unwrap();

    assert_eq!(record.state, RunState::Failed);
    assert_eq!(record.reason.as_deref(), Some("cancelled"));
    assert!(record.report.unwrap().stages.is_empty());
    assert_eq!(fx.graph.counts().await.unwrap().nodes, 0);
}

#[tokio::test]
async fn overlapping_trigger_is_dropped() {
    let fx = fixture();
    let reconciler = Reconciler::new(fx.ctx.clone(), 10);

    let guard = reconciler.claim(Scope::All, Trigger::Manual).unwrap();
    match reconciler.trigger(Scope::Entity(EntityKind::Tag), Trigger::OnDemand) {
        TriggerOutcome::Dropped { active } => assert_eq!(active, guard.id()),
        other => panic!("expected drop, got {other:?}"),
    }
    drop(guard);

    let tags = reconciler
        .claim(Scope::Entity(EntityKind::Tag), Trigger::OnDemand)
        .unwrap();
    // Disjoint scopes may run side by side.
    let evidence = reconciler.claim(Scope::Entity(EntityKind::Evidence), Trigger::OnDemand);
    assert!(evidence.is_ok());
    assert_eq!(
        reconciler
            .claim(Scope::Entity(EntityKind::Tag), Trigger::OnDemand)
            .err(),
        Some(tags.id())
    );
}

#[tokio::test]
async fn released_guard_marks_unfinished_run_failed() {
    let fx = fixture();
    let reconciler = Reconciler::new(fx.ctx.clone(), 10);

    let guard = reconciler.claim(Scope::All, Trigger::Manual).unwrap();
    let id = guard.id();
    drop(guard);

    let record = reconciler.get(id).unwrap();
    assert_eq!(record.state, RunState::Failed);
    assert_eq!(record.reason.as_deref(), Some("aborted"));
}

#[tokio::test]
async fn history_is_bounded() {
    let fx = fixture();
    let reconciler = Reconciler::new(fx.ctx.clone(), 2);

    for _ in 0..3 {
        reconciler
            .run(Scope::ProjectControl, Trigger::Manual, CancellationToken::new())
            .await
            .unwrap();
    }
    assert_eq!(reconciler.runs().len(), 2);
}

#[tokio::test]
async fn triggered_run_completes_in_background() {
    let fx = fixture();
    let reconciler = Reconciler::new(fx.ctx.clone(), 10);

    let TriggerOutcome::Started(id) = reconciler.trigger(Scope::All, Trigger::OnDemand) else {
        panic!("run was not started");
    };

    let mut state = RunState::Running;
    for _ in 0..200 {
        state = reconciler.get(id).unwrap().state;
        if state != RunState::Running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(state, RunState::Completed);
    assert!(fx.graph.contains_node(EntityKind::Evidence, "e1").await);
}

#[tokio::test]
async fn shutdown_waits_for_background_runs() {
    let fx = fixture();
    let reconciler = Reconciler::new(fx.ctx.clone(), 10);

    let TriggerOutcome::Started(id) = reconciler.trigger(Scope::All, Trigger::OnDemand) else {
        panic!("run was not started");
    };
    reconciler.shutdown();
    reconciler.wait_background().await;

    let record = reconciler.get(id).unwrap();
    assert_eq!(record.state, RunState::Failed);
    assert_eq!(record.reason.as_deref(), Some("cancelled"));
    assert!(reconciler.active().is_empty());
}

#[tokio::test(start_paused = true)]
async fn periodic_runs_follow_the_interval() {
    let fx = fixture();
    let reconciler = Reconciler::new(fx.ctx.clone(), 10);
    let cancel = CancellationToken::new();
    let periodic = tokio::spawn({
        let reconciler = reconciler.clone();
        let cancel = cancel.clone();
        async move { reconciler.run_periodic(Duration::from_secs(60), cancel).await }
    });

    let periodic_runs = |reconciler: &Reconciler| -> Vec<RunState> {
        reconciler
            .runs()
            .into_iter()
            .filter(|r| r.trigger == Trigger::Periodic)
            .map(|r| r.state)
            .collect()
    };

    // Ticks at 0s and 60s.
    tokio::time::sleep(Duration::from_secs(90)).await;
    assert_eq!(
        periodic_runs(&reconciler),
        vec![RunState::Completed, RunState::Completed]
    );

    // The tick at 120s collides with a held full-scope claim.
    let guard = reconciler.claim(Scope::All, Trigger::Manual).unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(periodic_runs(&reconciler).len(), 2);
    drop(guard);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), periodic)
        .await
        .unwrap()
        .unwrap();
}
