//! Query tests against an in-memory database.

use crate::queries::projects::NewProject;
use crate::queries::relations::{list_pairs, Relation};
use crate::queries::*;
use crate::{init_in_memory, DbPool};

fn seeded() -> DbPool {
    let db = init_in_memory().unwrap();
    frameworks::create_framework(&db, "f1", "ISO 27001").unwrap();
    controls::create_control(&db, "c1", Some("f1"), "A.5.1", "Policies").unwrap();
    controls::create_control(&db, "c2", Some("f1"), "A.9.1", "Access control").unwrap();
    tags::create_tag(&db, "t-policy", "Policy").unwrap();
    tags::create_tag(&db, "t-access", "Access").unwrap();
    controls::add_control_tag(&db, "c1", "t-policy").unwrap();
    controls::add_control_tag(&db, "c1", "t-access").unwrap();
    users::create_user(&db, "u1", "alice@example.com", "customer").unwrap();
    users::create_user(&db, "u2", "bob@example.com", "auditor").unwrap();
    projects::create_project(
        &db,
        &NewProject {
            id: "p1",
            name: "Acme ISO",
            framework_id: Some("f1"),
            auditor_id: Some("u2"),
            customer_id: Some("u1"),
            ..Default::default()
        },
    )
    .unwrap();
    db
}

// ─── Reads ───────────────────────────────────────────────────────────────────

#[test]
fn control_rows_carry_tag_ids() {
    let db = seeded();
    let c1 = controls::get_control(&db, "c1").unwrap().unwrap();
    assert_eq!(c1.framework_id.as_deref(), Some("f1"));
    assert_eq!(c1.tag_ids, vec!["t-access".to_string(), "t-policy".to_string()]);

    let c2 = controls::get_control(&db, "c2").unwrap().unwrap();
    assert!(c2.tag_ids.is_empty());
}

#[test]
fn missing_rows_return_none() {
    let db = seeded();
    assert!(frameworks::get_framework(&db, "nope").unwrap().is_none());
    assert!(evidence::get_evidence(&db, "nope").unwrap().is_none());
    assert!(!users::user_exists(&db, "nope").unwrap());
}

#[test]
fn listing_pages_do_not_overlap() {
    let db = seeded();
    for i in 0..5 {
        tags::create_tag(&db, &format!("t{i}"), &format!("tag {i}")).unwrap();
    }

    let first = tags::list_tags(&db, 3, 0).unwrap();
    let second = tags::list_tags(&db, 3, 3).unwrap();
    let third = tags::list_tags(&db, 3, 6).unwrap();

    assert_eq!(first.len(), 3);
    assert_eq!(second.len(), 3);
    assert_eq!(third.len(), 1);
    let mut all: Vec<_> = first.iter().chain(&second).chain(&third).map(|t| t.id.clone()).collect();
    all.dedup();
    assert_eq!(all.len(), 7);
}

#[test]
fn evidence_rows_expose_explicit_controls() {
    let db = seeded();
    evidence::create_evidence(&db, "e1", "policy.pdf", Some("p1"), Some("u1")).unwrap();
    evidence::add_evidence_tag(&db, "e1", "t-policy").unwrap();
    project_controls::create_project_control(&db, "pc1", "p1", "c1", 0).unwrap();
    evidence::link_project_control(&db, "e1", "pc1").unwrap();

    let e1 = evidence::get_evidence(&db, "e1").unwrap().unwrap();
    assert_eq!(e1.tag_ids, vec!["t-policy".to_string()]);
    assert_eq!(e1.control_ids, vec!["c1".to_string()]);
    assert_eq!(e1.uploaded_by_id.as_deref(), Some("u1"));
}

// ─── Counters ────────────────────────────────────────────────────────────────

#[test]
fn linked_evidence_is_counted_distinctly() {
    let db = seeded();
    project_controls::create_project_control(&db, "pc1", "p1", "c1", 1).unwrap();
    for id in ["e1", "e2", "e3"] {
        evidence::create_evidence(&db, id, "f.pdf", Some("p1"), Some("u1")).unwrap();
        evidence::link_project_control(&db, id, "pc1").unwrap();
    }
    // Linking twice must not double count.
    evidence::link_project_control(&db, "e1", "pc1").unwrap();

    assert_eq!(project_controls::count_linked_evidence(&db, "pc1").unwrap(), 3);

    project_controls::update_evidence_count(&db, "pc1", 3).unwrap();
    let pc = project_controls::get_project_control(&db, "pc1").unwrap().unwrap();
    assert_eq!(pc.evidence_count, 3);
}

#[test]
fn project_control_is_unique_per_project_and_control() {
    let db = seeded();
    project_controls::create_project_control(&db, "pc1", "p1", "c1", 0).unwrap();
    assert!(project_controls::create_project_control(&db, "pc2", "p1", "c1", 0).is_err());
}

#[test]
fn updating_unknown_counter_is_not_found() {
    let db = seeded();
    let err = project_controls::update_evidence_count(&db, "missing", 2).unwrap_err();
    assert!(matches!(err, crate::DbError::NotFound(_)));
}

// ─── Relations ───────────────────────────────────────────────────────────────

#[test]
fn framework_delete_cascades_to_controls() {
    let db = seeded();
    assert!(frameworks::delete_framework(&db, "f1").unwrap());
    assert!(controls::list_control_ids(&db).unwrap().is_empty());
    // Tags are independent of frameworks.
    assert_eq!(tags::list_tag_ids(&db).unwrap().len(), 2);
}

#[test]
fn relation_pairs_follow_graph_direction() {
    let db = seeded();
    evidence::create_evidence(&db, "e1", "a.pdf", Some("p1"), Some("u1")).unwrap();
    evidence::create_evidence(&db, "e2", "b.pdf", Some("p1"), None).unwrap();

    let uploads = list_pairs(&db, Relation::UploaderEvidence).unwrap();
    assert_eq!(uploads, vec![("u1".to_string(), "e1".to_string())]);

    let mut belongs = list_pairs(&db, Relation::ControlFramework).unwrap();
    belongs.sort();
    assert_eq!(
        belongs,
        vec![
            ("c1".to_string(), "f1".to_string()),
            ("c2".to_string(), "f1".to_string())
        ]
    );

    let auditors = list_pairs(&db, Relation::AuditorProject).unwrap();
    assert_eq!(auditors, vec![("u2".to_string(), "p1".to_string())]);
    assert!(list_pairs(&db, Relation::ReviewerProject).unwrap().is_empty());
}
