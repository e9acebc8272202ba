use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;

const LAST_HEARTBEAT_KEY: &str = "last_heartbeat_at";
const LAST_MONITOR_HOUR_KEY: &str = "last_monitor_hour";

fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM scheduler_state WHERE key = ?1", [key], |row| row.get(0))
        .optional()?)
}

fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO scheduler_state (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![key, value],
    )?;
    Ok(())
}

pub fn last_heartbeat_at(conn: &Connection) -> Result<Option<String>> {
    get(conn, LAST_HEARTBEAT_KEY)
}

pub fn set_last_heartbeat_at(conn: &Connection, at: &str) -> Result<()> {
    set(conn, LAST_HEARTBEAT_KEY, at)
}

/// The UTC hour (0-23) last swept, stored as a decimal string.
pub fn last_monitor_hour(conn: &Connection) -> Result<Option<u32>> {
    Ok(get(conn, LAST_MONITOR_HOUR_KEY)?.and_then(|v| v.parse().ok()))
}

pub fn set_last_monitor_hour(conn: &Connection, hour: u32) -> Result<()> {
    set(conn, LAST_MONITOR_HOUR_KEY, &hour.to_string())
}
