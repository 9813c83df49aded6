//! Tag queries.

use crate::pool::{DbPool, DbResult};
use rusqlite::{params, OptionalExtension};

use super::{collect_ids, page, row_exists};

/// Tag row from database. Names keep their stored case.
#[derive(Debug, Clone, PartialEq)]
pub struct TagRow {
    pub id: String,
    pub name: String,
}

/// Create a tag.
pub fn create_tag(pool: &DbPool, id: &str, name: &str) -> DbResult<()> {
    pool.with_conn(|conn| {
        conn.execute("INSERT INTO tags (id, name) VALUES (?1, ?2)", params![id, name])?;
        Ok(())
    })
}

/// Delete a tag. Links to controls and evidence are removed by cascade.
pub fn delete_tag(pool: &DbPool, id: &str) -> DbResult<bool> {
    pool.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM tags WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}

/// Get a tag by ID.
pub fn get_tag(pool: &DbPool, id: &str) -> DbResult<Option<TagRow>> {
    pool.with_conn(|conn| {
        Ok(conn
            .query_row("SELECT id, name FROM tags WHERE id = ?1", params![id], |row| {
                Ok(TagRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .optional()?)
    })
}

/// List one page of tags.
pub fn list_tags(pool: &DbPool, limit: usize, offset: usize) -> DbResult<Vec<TagRow>> {
    let (limit, offset) = page(limit, offset);
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT id, name FROM tags ORDER BY id LIMIT ?1 OFFSET ?2")?;
        let rows = stmt.query_map(params![limit, offset], |row| {
            Ok(TagRow {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;

        let mut tags = Vec::new();
        for row in rows {
            tags.push(row?);
        }
        Ok(tags)
    })
}

/// All tag IDs.
pub fn list_tag_ids(pool: &DbPool) -> DbResult<Vec<String>> {
    pool.with_conn(|conn| collect_ids(conn, "SELECT id FROM tags"))
}

/// Whether a tag row exists.
pub fn tag_exists(pool: &DbPool, id: &str) -> DbResult<bool> {
    pool.with_conn(|conn| row_exists(conn, "SELECT 1 FROM tags WHERE id = ?1", id))
}
