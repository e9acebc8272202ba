use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::error::{MonitorError, Result};
use crate::types::{EntityType, MonitorEntity};

fn row_to_entity(row: &rusqlite::Row) -> rusqlite::Result<MonitorEntity> {
    let entity_type: String = row.get(4)?;
    Ok(MonitorEntity {
        id: row.get(0)?,
        topic_id: row.get(1)?,
        name: row.get(2)?,
        url: row.get(3)?,
        entity_type: entity_type.parse().unwrap_or(EntityType::Company),
        created_at: row.get(5)?,
    })
}

const COLUMNS: &str = "id, topic_id, name, url, entity_type, created_at";

pub fn create(conn: &Connection, topic_id: i64, name: &str, url: &str, entity_type: EntityType) -> Result<MonitorEntity> {
    let created_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO monitor_entities (topic_id, name, url, entity_type, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![topic_id, name, url, entity_type.as_str(), created_at],
    )?;
    let id = conn.last_insert_rowid();
    Ok(MonitorEntity { id, topic_id, name: name.to_string(), url: url.to_string(), entity_type, created_at })
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<MonitorEntity>> {
    Ok(conn.query_row(&format!("SELECT {COLUMNS} FROM monitor_entities WHERE id = ?1"), [id], row_to_entity).optional()?)
}

pub fn get_by_name(conn: &Connection, name: &str) -> Result<Option<MonitorEntity>> {
    Ok(conn
        .query_row(&format!("SELECT {COLUMNS} FROM monitor_entities WHERE name = ?1"), [name], row_to_entity)
        .optional()?)
}

pub fn require_by_name(conn: &Connection, name: &str) -> Result<MonitorEntity> {
    get_by_name(conn, name)?.ok_or_else(|| MonitorError::EntityNotFound(name.to_string()))
}

pub fn list(conn: &Connection, topic_id: Option<i64>) -> Result<Vec<MonitorEntity>> {
    let mut stmt = match topic_id {
        Some(_) => conn.prepare(&format!("SELECT {COLUMNS} FROM monitor_entities WHERE topic_id = ?1 ORDER BY name"))?,
        None => conn.prepare(&format!("SELECT {COLUMNS} FROM monitor_entities ORDER BY name"))?,
    };
    let entities = match topic_id {
        Some(id) => stmt.query_map([id], row_to_entity)?.filter_map(|r| r.ok()).collect(),
        None => stmt.query_map([], row_to_entity)?.filter_map(|r| r.ok()).collect(),
    };
    Ok(entities)
}

pub fn delete(conn: &Connection, name: &str) -> Result<()> {
    let n = conn.execute("DELETE FROM monitor_entities WHERE name = ?1", [name])?;
    if n == 0 {
        return Err(MonitorError::EntityNotFound(name.to_string()));
    }
    Ok(())
}
