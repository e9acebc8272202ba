use rusqlite::Connection;

use crate::error::Result;
use crate::types::{ChannelType, MonitorSubscriber};

fn row_to_subscriber(row: &rusqlite::Row) -> rusqlite::Result<MonitorSubscriber> {
    let channel_type: String = row.get(1)?;
    let channel_config: String = row.get(2)?;
    Ok(MonitorSubscriber {
        id: row.get(0)?,
        channel_type: channel_type.parse().unwrap_or(ChannelType::Telegram),
        channel_config: serde_json::from_str(&channel_config).unwrap_or(serde_json::Value::Null),
        topic_id: row.get(3)?,
        entity_id: row.get(4)?,
        resource_id: row.get(5)?,
        enabled: row.get(6)?,
    })
}

const COLUMNS: &str = "id, channel_type, channel_config, topic_id, entity_id, resource_id, enabled";

pub fn create(
    conn: &Connection,
    channel_type: ChannelType,
    channel_config: &serde_json::Value,
    topic_id: Option<i64>,
    entity_id: Option<i64>,
    resource_id: Option<i64>,
) -> Result<MonitorSubscriber> {
    let config_json = serde_json::to_string(channel_config)?;
    conn.execute(
        "INSERT INTO monitor_subscribers (channel_type, channel_config, topic_id, entity_id, resource_id, enabled)
         VALUES (?1, ?2, ?3, ?4, ?5, 1)",
        rusqlite::params![channel_type.as_str(), config_json, topic_id, entity_id, resource_id],
    )?;
    let id = conn.last_insert_rowid();
    Ok(MonitorSubscriber {
        id,
        channel_type,
        channel_config: channel_config.clone(),
        topic_id,
        entity_id,
        resource_id,
        enabled: true,
    })
}

/// Enabled subscribers for a topic: subscribed directly to the topic, or to
/// any entity/resource beneath it (loaded by the caller, which already knows
/// the topic's entity/resource id sets).
pub fn enabled_for_topic(conn: &Connection, topic_id: i64, entity_ids: &[i64], resource_ids: &[i64]) -> Result<Vec<MonitorSubscriber>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM monitor_subscribers WHERE enabled = 1"))?;
    let all: Vec<MonitorSubscriber> = stmt.query_map([], row_to_subscriber)?.filter_map(|r| r.ok()).collect();
    Ok(all
        .into_iter()
        .filter(|s| {
            s.topic_id == Some(topic_id)
                || s.entity_id.is_some_and(|e| entity_ids.contains(&e))
                || s.resource_id.is_some_and(|r| resource_ids.contains(&r))
        })
        .collect())
}

pub fn set_enabled(conn: &Connection, id: i64, enabled: bool) -> Result<()> {
    conn.execute("UPDATE monitor_subscribers SET enabled = ?1 WHERE id = ?2", rusqlite::params![enabled, id])?;
    Ok(())
}

pub fn delete(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM monitor_subscribers WHERE id = ?1", [id])?;
    Ok(())
}

pub fn list(conn: &Connection) -> Result<Vec<MonitorSubscriber>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM monitor_subscribers ORDER BY id"))?;
    let subs = stmt.query_map([], row_to_subscriber)?.filter_map(|r| r.ok()).collect();
    Ok(subs)
}
