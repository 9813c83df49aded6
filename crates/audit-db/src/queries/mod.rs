//! Database query implementations.
//!
//! Every query is a fixed, parameterized statement. Listing queries are paged
//! with `limit`/`offset` and ordered by primary key so consecutive pages do not
//! overlap.

pub mod controls;
pub mod evidence;
pub mod frameworks;
pub mod project_controls;
pub mod projects;
pub mod relations;
pub mod tags;
pub mod users;

use rusqlite::{params, Connection};

use crate::pool::DbResult;

/// Separator used by `group_concat` when collecting id lists.
pub(crate) const ID_SEP: char = '\u{1f}';

/// Split a `group_concat` result into ids.
pub(crate) fn split_ids(joined: Option<String>) -> Vec<String> {
    match joined {
        Some(s) if !s.is_empty() => {
            let mut ids: Vec<String> = s.split(ID_SEP).map(str::to_string).collect();
            ids.sort();
            ids.dedup();
            ids
        }
        _ => Vec::new(),
    }
}

/// Collect the first text column of a query into a vector.
pub(crate) fn collect_ids(conn: &Connection, sql: &str) -> DbResult<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut ids = Vec::new();
    for id in rows {
        ids.push(id?);
    }
    Ok(ids)
}

/// Collect `(from, to)` id pairs from a two-column query.
pub(crate) fn collect_pairs(conn: &Connection, sql: &str) -> DbResult<Vec<(String, String)>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    let mut pairs = Vec::new();
    for pair in rows {
        pairs.push(pair?);
    }
    Ok(pairs)
}

/// Check whether a single-column existence query returns a row.
pub(crate) fn row_exists(conn: &Connection, sql: &str, id: &str) -> DbResult<bool> {
    let mut stmt = conn.prepare(sql)?;
    Ok(stmt.exists(params![id])?)
}

/// Convert page bounds to SQLite integers.
pub(crate) fn page(limit: usize, offset: usize) -> (i64, i64) {
    (limit as i64, offset as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_ids_handles_empty_and_duplicates() {
        assert!(split_ids(None).is_empty());
        assert!(split_ids(Some(String::new())).is_empty());

        let joined = format!("b{ID_SEP}a{ID_SEP}b");
        assert_eq!(split_ids(Some(joined)), vec!["a".to_string(), "b".to_string()]);
    }
}
