use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::error::{MonitorError, Result};
use crate::types::MonitorTopic;

fn row_to_topic(row: &rusqlite::Row) -> rusqlite::Result<MonitorTopic> {
    Ok(MonitorTopic {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub fn create(conn: &Connection, name: &str, description: Option<&str>) -> Result<MonitorTopic> {
    let created_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO monitor_topics (name, description, created_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![name, description, created_at],
    )?;
    let id = conn.last_insert_rowid();
    Ok(MonitorTopic { id, name: name.to_string(), description: description.map(str::to_string), created_at })
}

pub fn get_by_name(conn: &Connection, name: &str) -> Result<Option<MonitorTopic>> {
    Ok(conn
        .query_row(
            "SELECT id, name, description, created_at FROM monitor_topics WHERE name = ?1",
            [name],
            row_to_topic,
        )
        .optional()?)
}

pub fn require_by_name(conn: &Connection, name: &str) -> Result<MonitorTopic> {
    get_by_name(conn, name)?.ok_or_else(|| MonitorError::TopicNotFound(name.to_string()))
}

pub fn list(conn: &Connection) -> Result<Vec<MonitorTopic>> {
    let mut stmt = conn.prepare("SELECT id, name, description, created_at FROM monitor_topics ORDER BY name")?;
    let topics = stmt.query_map([], row_to_topic)?.filter_map(|r| r.ok()).collect();
    Ok(topics)
}

/// Deletes the topic and, via `ON DELETE CASCADE`, every entity/resource/
/// snapshot/digest/subscriber beneath it.
pub fn delete(conn: &Connection, name: &str) -> Result<()> {
    let n = conn.execute("DELETE FROM monitor_topics WHERE name = ?1", [name])?;
    if n == 0 {
        return Err(MonitorError::TopicNotFound(name.to_string()));
    }
    Ok(())
}
