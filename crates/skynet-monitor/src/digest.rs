use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;
use crate::types::{ChangeType, MonitorDigest};

fn row_to_digest(row: &rusqlite::Row) -> rusqlite::Result<MonitorDigest> {
    let change_type: String = row.get(6)?;
    Ok(MonitorDigest {
        id: row.get(0)?,
        topic_id: row.get(1)?,
        entity_id: row.get(2)?,
        resource_id: row.get(3)?,
        snapshot_id: row.get(4)?,
        summary: row.get(5)?,
        change_type: change_type.parse().unwrap_or(ChangeType::ContentUpdate),
        created_at: row.get(7)?,
    })
}

const COLUMNS: &str = "id, topic_id, entity_id, resource_id, snapshot_id, summary, change_type, created_at";

#[allow(clippy::too_many_arguments)]
pub fn insert(
    conn: &Connection,
    topic_id: i64,
    entity_id: i64,
    resource_id: i64,
    snapshot_id: i64,
    summary: &str,
    change_type: ChangeType,
) -> Result<MonitorDigest> {
    let created_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO monitor_digests (topic_id, entity_id, resource_id, snapshot_id, summary, change_type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![topic_id, entity_id, resource_id, snapshot_id, summary, change_type.as_str(), created_at],
    )?;
    let id = conn.last_insert_rowid();
    Ok(MonitorDigest {
        id,
        topic_id,
        entity_id,
        resource_id,
        snapshot_id,
        summary: summary.to_string(),
        change_type,
        created_at,
    })
}

pub fn exists_for_snapshot(conn: &Connection, snapshot_id: i64) -> Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM monitor_digests WHERE snapshot_id = ?1 LIMIT 1", [snapshot_id], |_| Ok(()))
        .optional()?
        .is_some())
}

pub fn list(conn: &Connection, topic_id: Option<i64>, entity_id: Option<i64>, limit: usize) -> Result<Vec<MonitorDigest>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM monitor_digests
         WHERE (?1 IS NULL OR topic_id = ?1)
           AND (?2 IS NULL OR entity_id = ?2)
         ORDER BY created_at DESC LIMIT ?3"
    );
    let mut stmt = conn.prepare(&sql)?;
    let digests = stmt
        .query_map(rusqlite::params![topic_id, entity_id, limit as i64], row_to_digest)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(digests)
}

/// Most recent digest per resource, keyed by resource id — used to give
/// blog-type resources AI-summary context in report synthesis.
pub fn latest_by_resource(conn: &Connection, topic_id: Option<i64>) -> Result<std::collections::HashMap<i64, String>> {
    let digests = list(conn, topic_id, None, 500)?;
    let mut map = std::collections::HashMap::new();
    for d in digests {
        map.entry(d.resource_id).or_insert(d.summary);
    }
    Ok(map)
}
