//! Evidence queries.

use crate::pool::{DbPool, DbResult};
use rusqlite::{params, OptionalExtension, Row};

use super::{collect_ids, page, row_exists, split_ids};

/// Evidence row from database.
///
/// `control_ids` are the controls behind the explicitly linked project
/// controls; tag-derived coverage is never stored here.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceRow {
    pub id: String,
    pub file_name: String,
    pub project_id: Option<String>,
    pub uploaded_by_id: Option<String>,
    pub tag_ids: Vec<String>,
    pub control_ids: Vec<String>,
}

const SELECT_EVIDENCE: &str = "
    SELECT e.id, e.file_name, e.project_id, e.uploaded_by_id,
           (SELECT group_concat(et.tag_id, char(31)) FROM evidence_tags et WHERE et.evidence_id = e.id),
           (SELECT group_concat(pc.control_id, char(31))
              FROM evidence_controls ec
              JOIN project_controls pc ON pc.id = ec.project_control_id
             WHERE ec.evidence_id = e.id)
    FROM evidence e";

fn map_evidence(row: &Row<'_>) -> rusqlite::Result<EvidenceRow> {
    Ok(EvidenceRow {
        id: row.get(0)?,
        file_name: row.get(1)?,
        project_id: row.get(2)?,
        uploaded_by_id: row.get(3)?,
        tag_ids: split_ids(row.get(4)?),
        control_ids: split_ids(row.get(5)?),
    })
}

/// Create an evidence row.
pub fn create_evidence(
    pool: &DbPool,
    id: &str,
    file_name: &str,
    project_id: Option<&str>,
    uploaded_by_id: Option<&str>,
) -> DbResult<()> {
    pool.with_conn(|conn| {
        conn.execute(
            "INSERT INTO evidence (id, file_name, project_id, uploaded_by_id) VALUES (?1, ?2, ?3, ?4)",
            params![id, file_name, project_id, uploaded_by_id],
        )?;
        Ok(())
    })
}

/// Change the uploader of an evidence row.
pub fn set_uploader(pool: &DbPool, id: &str, uploaded_by_id: Option<&str>) -> DbResult<()> {
    pool.with_conn(|conn| {
        conn.execute(
            "UPDATE evidence SET uploaded_by_id = ?2 WHERE id = ?1",
            params![id, uploaded_by_id],
        )?;
        Ok(())
    })
}

/// Attach a tag to an evidence row.
pub fn add_evidence_tag(pool: &DbPool, evidence_id: &str, tag_id: &str) -> DbResult<()> {
    pool.with_conn(|conn| {
        conn.execute(
            "INSERT OR IGNORE INTO evidence_tags (evidence_id, tag_id) VALUES (?1, ?2)",
            params![evidence_id, tag_id],
        )?;
        Ok(())
    })
}

/// Explicitly link evidence to a project control.
///
/// Does not touch the cached `evidence_count`; counter healing does that.
pub fn link_project_control(pool: &DbPool, evidence_id: &str, project_control_id: &str) -> DbResult<()> {
    pool.with_conn(|conn| {
        conn.execute(
            "INSERT OR IGNORE INTO evidence_controls (evidence_id, project_control_id) VALUES (?1, ?2)",
            params![evidence_id, project_control_id],
        )?;
        Ok(())
    })
}

/// Delete an evidence row.
pub fn delete_evidence(pool: &DbPool, id: &str) -> DbResult<bool> {
    pool.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM evidence WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}

/// Get an evidence row by ID.
pub fn get_evidence(pool: &DbPool, id: &str) -> DbResult<Option<EvidenceRow>> {
    pool.with_conn(|conn| {
        let sql = format!("{SELECT_EVIDENCE} WHERE e.id = ?1");
        Ok(conn.query_row(&sql, params![id], map_evidence).optional()?)
    })
}

/// List one page of evidence.
pub fn list_evidence(pool: &DbPool, limit: usize, offset: usize) -> DbResult<Vec<EvidenceRow>> {
    let (limit, offset) = page(limit, offset);
    pool.with_conn(|conn| {
        let sql = format!("{SELECT_EVIDENCE} ORDER BY e.id LIMIT ?1 OFFSET ?2");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit, offset], map_evidence)?;

        let mut evidence = Vec::new();
        for row in rows {
            evidence.push(row?);
        }
        Ok(evidence)
    })
}

/// All evidence IDs.
pub fn list_evidence_ids(pool: &DbPool) -> DbResult<Vec<String>> {
    pool.with_conn(|conn| collect_ids(conn, "SELECT id FROM evidence"))
}

/// Whether an evidence row exists.
pub fn evidence_exists(pool: &DbPool, id: &str) -> DbResult<bool> {
    pool.with_conn(|conn| row_exists(conn, "SELECT 1 FROM evidence WHERE id = ?1", id))
}
