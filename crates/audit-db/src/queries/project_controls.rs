//! ProjectControl queries, including the cached evidence counter.
//!
//! `update_evidence_count` is the only write the synchronizer ever issues
//! against the relational store.

use crate::pool::{DbError, DbPool, DbResult};
use rusqlite::{params, OptionalExtension, Row};

use super::page;

/// ProjectControl row from database.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectControlRow {
    pub id: String,
    pub project_id: String,
    pub control_id: String,
    pub evidence_count: i64,
}

const SELECT_PROJECT_CONTROL: &str =
    "SELECT id, project_id, control_id, evidence_count FROM project_controls";

fn map_project_control(row: &Row<'_>) -> rusqlite::Result<ProjectControlRow> {
    Ok(ProjectControlRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        control_id: row.get(2)?,
        evidence_count: row.get(3)?,
    })
}

/// Create a project control with an initial cached count.
pub fn create_project_control(
    pool: &DbPool,
    id: &str,
    project_id: &str,
    control_id: &str,
    evidence_count: i64,
) -> DbResult<()> {
    pool.with_conn(|conn| {
        conn.execute(
            "INSERT INTO project_controls (id, project_id, control_id, evidence_count)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, project_id, control_id, evidence_count],
        )?;
        Ok(())
    })
}

/// Get a project control by ID.
pub fn get_project_control(pool: &DbPool, id: &str) -> DbResult<Option<ProjectControlRow>> {
    pool.with_conn(|conn| {
        let sql = format!("{SELECT_PROJECT_CONTROL} WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], map_project_control).optional()?)
    })
}

/// List one page of project controls.
pub fn list_project_controls(
    pool: &DbPool,
    limit: usize,
    offset: usize,
) -> DbResult<Vec<ProjectControlRow>> {
    let (limit, offset) = page(limit, offset);
    pool.with_conn(|conn| {
        let sql = format!("{SELECT_PROJECT_CONTROL} ORDER BY id LIMIT ?1 OFFSET ?2");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit, offset], map_project_control)?;

        let mut pcs = Vec::new();
        for row in rows {
            pcs.push(row?);
        }
        Ok(pcs)
    })
}

/// Count distinct evidence rows explicitly linked to a project control.
pub fn count_linked_evidence(pool: &DbPool, project_control_id: &str) -> DbResult<i64> {
    pool.with_conn(|conn| {
        Ok(conn.query_row(
            "SELECT COUNT(DISTINCT evidence_id) FROM evidence_controls WHERE project_control_id = ?1",
            params![project_control_id],
            |row| row.get(0),
        )?)
    })
}

/// Write the cached evidence counter.
pub fn update_evidence_count(pool: &DbPool, id: &str, evidence_count: i64) -> DbResult<()> {
    pool.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE project_controls SET evidence_count = ?2 WHERE id = ?1",
            params![id, evidence_count],
        )?;
        if changed == 0 {
            return Err(DbError::NotFound(format!("ProjectControl: {}", id)));
        }
        Ok(())
    })
}
