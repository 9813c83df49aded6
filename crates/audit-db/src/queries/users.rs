//! User queries.

use crate::pool::{DbPool, DbResult};
use rusqlite::{params, OptionalExtension};

use super::{collect_ids, page, row_exists};

/// User row from database.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub role: String,
}

/// Create a user.
pub fn create_user(pool: &DbPool, id: &str, email: &str, role: &str) -> DbResult<()> {
    pool.with_conn(|conn| {
        conn.execute(
            "INSERT INTO users (id, email, role) VALUES (?1, ?2, ?3)",
            params![id, email, role],
        )?;
        Ok(())
    })
}

/// Delete a user.
pub fn delete_user(pool: &DbPool, id: &str) -> DbResult<bool> {
    pool.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}

/// Get a user by ID.
pub fn get_user(pool: &DbPool, id: &str) -> DbResult<Option<UserRow>> {
    pool.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT id, email, role FROM users WHERE id = ?1",
                params![id],
                |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        role: row.get(2)?,
                    })
                },
            )
            .optional()?)
    })
}

/// List one page of users.
pub fn list_users(pool: &DbPool, limit: usize, offset: usize) -> DbResult<Vec<UserRow>> {
    let (limit, offset) = page(limit, offset);
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, email, role FROM users ORDER BY id LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt.query_map(params![limit, offset], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                role: row.get(2)?,
            })
        })?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    })
}

/// All user IDs.
pub fn list_user_ids(pool: &DbPool) -> DbResult<Vec<String>> {
    pool.with_conn(|conn| collect_ids(conn, "SELECT id FROM users"))
}

/// Whether a user row exists.
pub fn user_exists(pool: &DbPool, id: &str) -> DbResult<bool> {
    pool.with_conn(|conn| row_exists(conn, "SELECT 1 FROM users WHERE id = ?1", id))
}
