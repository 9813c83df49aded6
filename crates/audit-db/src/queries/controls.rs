//! Control queries.

use crate::pool::{DbPool, DbResult};
use rusqlite::{params, OptionalExtension, Row};

use super::{collect_ids, page, row_exists, split_ids};

/// Control row from database, with its tag IDs.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlRow {
    pub id: String,
    pub framework_id: Option<String>,
    pub code: String,
    pub title: String,
    pub tag_ids: Vec<String>,
}

const SELECT_CONTROL: &str = "
    SELECT c.id, c.framework_id, c.code, c.title,
           (SELECT group_concat(ct.tag_id, char(31)) FROM control_tags ct WHERE ct.control_id = c.id)
    FROM controls c";

fn map_control(row: &Row<'_>) -> rusqlite::Result<ControlRow> {
    Ok(ControlRow {
        id: row.get(0)?,
        framework_id: row.get(1)?,
        code: row.get(2)?,
        title: row.get(3)?,
        tag_ids: split_ids(row.get(4)?),
    })
}

/// Create a control.
pub fn create_control(
    pool: &DbPool,
    id: &str,
    framework_id: Option<&str>,
    code: &str,
    title: &str,
) -> DbResult<()> {
    pool.with_conn(|conn| {
        conn.execute(
            "INSERT INTO controls (id, framework_id, code, title) VALUES (?1, ?2, ?3, ?4)",
            params![id, framework_id, code, title],
        )?;
        Ok(())
    })
}

/// Attach a tag to a control.
pub fn add_control_tag(pool: &DbPool, control_id: &str, tag_id: &str) -> DbResult<()> {
    pool.with_conn(|conn| {
        conn.execute(
            "INSERT OR IGNORE INTO control_tags (control_id, tag_id) VALUES (?1, ?2)",
            params![control_id, tag_id],
        )?;
        Ok(())
    })
}

/// Delete a control.
pub fn delete_control(pool: &DbPool, id: &str) -> DbResult<bool> {
    pool.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM controls WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}

/// Get a control by ID.
pub fn get_control(pool: &DbPool, id: &str) -> DbResult<Option<ControlRow>> {
    pool.with_conn(|conn| {
        let sql = format!("{SELECT_CONTROL} WHERE c.id = ?1");
        Ok(conn.query_row(&sql, params![id], map_control).optional()?)
    })
}

/// List one page of controls.
pub fn list_controls(pool: &DbPool, limit: usize, offset: usize) -> DbResult<Vec<ControlRow>> {
    let (limit, offset) = page(limit, offset);
    pool.with_conn(|conn| {
        let sql = format!("{SELECT_CONTROL} ORDER BY c.id LIMIT ?1 OFFSET ?2");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit, offset], map_control)?;

        let mut controls = Vec::new();
        for row in rows {
            controls.push(row?);
        }
        Ok(controls)
    })
}

/// All control IDs.
pub fn list_control_ids(pool: &DbPool) -> DbResult<Vec<String>> {
    pool.with_conn(|conn| collect_ids(conn, "SELECT id FROM controls"))
}

/// Whether a control row exists.
pub fn control_exists(pool: &DbPool, id: &str) -> DbResult<bool> {
    pool.with_conn(|conn| row_exists(conn, "SELECT 1 FROM controls WHERE id = ?1", id))
}
