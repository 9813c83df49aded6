//! Framework queries.

use crate::pool::{DbError, DbPool, DbResult};
use rusqlite::{params, OptionalExtension};

use super::{collect_ids, page, row_exists};

/// Framework row from database.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameworkRow {
    pub id: String,
    pub name: String,
}

/// Create a framework.
pub fn create_framework(pool: &DbPool, id: &str, name: &str) -> DbResult<()> {
    pool.with_conn(|conn| {
        conn.execute(
            "INSERT INTO frameworks (id, name) VALUES (?1, ?2)",
            params![id, name],
        )?;
        Ok(())
    })
}

/// Rename a framework.
pub fn rename_framework(pool: &DbPool, id: &str, name: &str) -> DbResult<()> {
    pool.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE frameworks SET name = ?2 WHERE id = ?1",
            params![id, name],
        )?;
        if changed == 0 {
            return Err(DbError::NotFound(format!("Framework: {}", id)));
        }
        Ok(())
    })
}

/// Delete a framework. Its controls are removed by cascade.
pub fn delete_framework(pool: &DbPool, id: &str) -> DbResult<bool> {
    pool.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM frameworks WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}

/// Get a framework by ID.
pub fn get_framework(pool: &DbPool, id: &str) -> DbResult<Option<FrameworkRow>> {
    pool.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT id, name FROM frameworks WHERE id = ?1",
                params![id],
                |row| {
                    Ok(FrameworkRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?)
    })
}

/// List one page of frameworks.
pub fn list_frameworks(pool: &DbPool, limit: usize, offset: usize) -> DbResult<Vec<FrameworkRow>> {
    let (limit, offset) = page(limit, offset);
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, name FROM frameworks ORDER BY id LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt.query_map(params![limit, offset], |row| {
            Ok(FrameworkRow {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;

        let mut frameworks = Vec::new();
        for row in rows {
            frameworks.push(row?);
        }
        Ok(frameworks)
    })
}

/// All framework IDs.
pub fn list_framework_ids(pool: &DbPool) -> DbResult<Vec<String>> {
    pool.with_conn(|conn| collect_ids(conn, "SELECT id FROM frameworks"))
}

/// Whether a framework row exists.
pub fn framework_exists(pool: &DbPool, id: &str) -> DbResult<bool> {
    pool.with_conn(|conn| row_exists(conn, "SELECT 1 FROM frameworks WHERE id = ?1", id))
}
