use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;
use crate::types::MonitorSnapshot;

fn row_to_snapshot(row: &rusqlite::Row) -> rusqlite::Result<MonitorSnapshot> {
    Ok(MonitorSnapshot {
        id: row.get(0)?,
        resource_id: row.get(1)?,
        content_hash: row.get(2)?,
        content_markdown: row.get(3)?,
        has_changes: row.get(4)?,
        fetched_at: row.get(5)?,
    })
}

const COLUMNS: &str = "id, resource_id, content_hash, content_markdown, has_changes, fetched_at";

pub fn insert(conn: &Connection, resource_id: i64, content_hash: &str, content_markdown: &str, has_changes: bool) -> Result<MonitorSnapshot> {
    let fetched_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO monitor_snapshots (resource_id, content_hash, content_markdown, has_changes, fetched_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![resource_id, content_hash, content_markdown, has_changes, fetched_at],
    )?;
    let id = conn.last_insert_rowid();
    Ok(MonitorSnapshot {
        id,
        resource_id,
        content_hash: content_hash.to_string(),
        content_markdown: content_markdown.to_string(),
        has_changes,
        fetched_at,
    })
}

pub fn latest(conn: &Connection, resource_id: i64) -> Result<Option<MonitorSnapshot>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM monitor_snapshots WHERE resource_id = ?1 ORDER BY fetched_at DESC, id DESC LIMIT 1"),
            [resource_id],
            row_to_snapshot,
        )
        .optional()?)
}

/// Most recent `limit` snapshots for a resource, newest first.
pub fn recent(conn: &Connection, resource_id: i64, limit: usize) -> Result<Vec<MonitorSnapshot>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM monitor_snapshots WHERE resource_id = ?1 ORDER BY fetched_at DESC, id DESC LIMIT ?2"
    ))?;
    let snaps = stmt
        .query_map(rusqlite::params![resource_id, limit as i64], row_to_snapshot)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(snaps)
}
