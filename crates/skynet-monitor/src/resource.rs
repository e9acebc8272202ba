use rusqlite::{Connection, OptionalExtension};

use crate::error::{MonitorError, Result};
use crate::types::{MonitorResource, ResourceType};

fn row_to_resource(row: &rusqlite::Row) -> rusqlite::Result<MonitorResource> {
    let resource_type: String = row.get(5)?;
    Ok(MonitorResource {
        id: row.get(0)?,
        entity_id: row.get(1)?,
        topic_id: row.get(2)?,
        name: row.get(3)?,
        url: row.get(4)?,
        resource_type: resource_type.parse().unwrap_or(ResourceType::Blog),
        last_checked_at: row.get(6)?,
        last_changed_at: row.get(7)?,
        enabled: row.get(8)?,
    })
}

const COLUMNS: &str = "id, entity_id, topic_id, name, url, resource_type, last_checked_at, last_changed_at, enabled";

#[allow(clippy::too_many_arguments)]
pub fn create(
    conn: &Connection,
    entity_id: i64,
    topic_id: i64,
    name: &str,
    url: &str,
    resource_type: ResourceType,
) -> Result<MonitorResource> {
    conn.execute(
        "INSERT INTO monitor_resources (entity_id, topic_id, name, url, resource_type, enabled)
         VALUES (?1, ?2, ?3, ?4, ?5, 1)",
        rusqlite::params![entity_id, topic_id, name, url, resource_type.as_str()],
    )?;
    let id = conn.last_insert_rowid();
    Ok(MonitorResource {
        id,
        entity_id,
        topic_id,
        name: name.to_string(),
        url: url.to_string(),
        resource_type,
        last_checked_at: None,
        last_changed_at: None,
        enabled: true,
    })
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<MonitorResource>> {
    Ok(conn
        .query_row(&format!("SELECT {COLUMNS} FROM monitor_resources WHERE id = ?1"), [id], row_to_resource)
        .optional()?)
}

pub fn require(conn: &Connection, id: i64) -> Result<MonitorResource> {
    get(conn, id)?.ok_or(MonitorError::ResourceNotFound(id))
}

pub fn list(conn: &Connection, topic_id: Option<i64>, entity_id: Option<i64>, enabled_only: bool) -> Result<Vec<MonitorResource>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM monitor_resources
         WHERE (?1 IS NULL OR topic_id = ?1)
           AND (?2 IS NULL OR entity_id = ?2)
           AND (?3 = 0 OR enabled = 1)
         ORDER BY name"
    );
    let mut stmt = conn.prepare(&sql)?;
    let resources = stmt
        .query_map(rusqlite::params![topic_id, entity_id, enabled_only as i64], row_to_resource)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(resources)
}

pub fn set_enabled(conn: &Connection, id: i64, enabled: bool) -> Result<()> {
    let n = conn.execute("UPDATE monitor_resources SET enabled = ?1 WHERE id = ?2", rusqlite::params![enabled, id])?;
    if n == 0 {
        return Err(MonitorError::ResourceNotFound(id));
    }
    Ok(())
}

pub fn mark_checked(conn: &Connection, id: i64, at: &str, changed: bool) -> Result<()> {
    if changed {
        conn.execute(
            "UPDATE monitor_resources SET last_checked_at = ?1, last_changed_at = ?1 WHERE id = ?2",
            rusqlite::params![at, id],
        )?;
    } else {
        conn.execute("UPDATE monitor_resources SET last_checked_at = ?1 WHERE id = ?2", rusqlite::params![at, id])?;
    }
    Ok(())
}

pub fn delete(conn: &Connection, id: i64) -> Result<()> {
    let n = conn.execute("DELETE FROM monitor_resources WHERE id = ?1", [id])?;
    if n == 0 {
        return Err(MonitorError::ResourceNotFound(id));
    }
    Ok(())
}
