//! Project-related database queries.

use crate::pool::{DbPool, DbResult};
use rusqlite::{params, OptionalExtension, Row};

use super::{collect_ids, page, row_exists};

/// Project row from database.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRow {
    pub id: String,
    pub name: String,
    pub framework_id: Option<String>,
    pub auditor_id: Option<String>,
    pub reviewer_id: Option<String>,
    pub customer_id: Option<String>,
}

/// Fields for a new project.
#[derive(Debug, Clone, Default)]
pub struct NewProject<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub framework_id: Option<&'a str>,
    pub auditor_id: Option<&'a str>,
    pub reviewer_id: Option<&'a str>,
    pub customer_id: Option<&'a str>,
}

const SELECT_PROJECT: &str =
    "SELECT id, name, framework_id, auditor_id, reviewer_id, customer_id FROM projects";

fn map_project(row: &Row<'_>) -> rusqlite::Result<ProjectRow> {
    Ok(ProjectRow {
        id: row.get(0)?,
        name: row.get(1)?,
        framework_id: row.get(2)?,
        auditor_id: row.get(3)?,
        reviewer_id: row.get(4)?,
        customer_id: row.get(5)?,
    })
}

/// Create a new project.
pub fn create_project(pool: &DbPool, project: &NewProject<'_>) -> DbResult<()> {
    pool.with_conn(|conn| {
        conn.execute(
            "INSERT INTO projects (id, name, framework_id, auditor_id, reviewer_id, customer_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                project.id,
                project.name,
                project.framework_id,
                project.auditor_id,
                project.reviewer_id,
                project.customer_id
            ],
        )?;
        Ok(())
    })
}

/// Delete a project. Its evidence and project controls are removed by cascade.
pub fn delete_project(pool: &DbPool, id: &str) -> DbResult<bool> {
    pool.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}

/// Get a project by ID.
pub fn get_project(pool: &DbPool, id: &str) -> DbResult<Option<ProjectRow>> {
    pool.with_conn(|conn| {
        let sql = format!("{SELECT_PROJECT} WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], map_project).optional()?)
    })
}

/// List one page of projects.
pub fn list_projects(pool: &DbPool, limit: usize, offset: usize) -> DbResult<Vec<ProjectRow>> {
    let (limit, offset) = page(limit, offset);
    pool.with_conn(|conn| {
        let sql = format!("{SELECT_PROJECT} ORDER BY id LIMIT ?1 OFFSET ?2");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit, offset], map_project)?;

        let mut projects = Vec::new();
        for row in rows {
            projects.push(row?);
        }
        Ok(projects)
    })
}

/// All project IDs.
pub fn list_project_ids(pool: &DbPool) -> DbResult<Vec<String>> {
    pool.with_conn(|conn| collect_ids(conn, "SELECT id FROM projects"))
}

/// Whether a project row exists.
pub fn project_exists(pool: &DbPool, id: &str) -> DbResult<bool> {
    pool.with_conn(|conn| row_exists(conn, "SELECT 1 FROM projects WHERE id = ?1", id))
}
