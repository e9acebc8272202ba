use rusqlite::{Connection, OptionalExtension};

use crate::error::{Result, SchedulerError};
use crate::types::HeartbeatCheck;

/// Sentinel the Agent is instructed to answer with when every check passes.
pub const HEARTBEAT_OK: &str = "HEARTBEAT_OK";

fn row_to_check(row: &rusqlite::Row) -> rusqlite::Result<HeartbeatCheck> {
    Ok(HeartbeatCheck {
        name: row.get(0)?,
        prompt: row.get(1)?,
        enabled: row.get(2)?,
    })
}

pub fn create(conn: &Connection, name: &str, prompt: &str) -> Result<HeartbeatCheck> {
    let exists = conn
        .query_row("SELECT 1 FROM heartbeat_checks WHERE name = ?1", [name], |_| Ok(()))
        .optional()?
        .is_some();
    if exists {
        return Err(SchedulerError::HeartbeatCheckAlreadyExists(name.to_string()));
    }
    conn.execute(
        "INSERT INTO heartbeat_checks (name, prompt, enabled) VALUES (?1, ?2, 1)",
        rusqlite::params![name, prompt],
    )?;
    Ok(HeartbeatCheck { name: name.to_string(), prompt: prompt.to_string(), enabled: true })
}

pub fn list(conn: &Connection) -> Result<Vec<HeartbeatCheck>> {
    let mut stmt = conn.prepare("SELECT name, prompt, enabled FROM heartbeat_checks ORDER BY name")?;
    let checks = stmt.query_map([], row_to_check)?.filter_map(|r| r.ok()).collect();
    Ok(checks)
}

pub fn list_enabled(conn: &Connection) -> Result<Vec<HeartbeatCheck>> {
    let mut stmt =
        conn.prepare("SELECT name, prompt, enabled FROM heartbeat_checks WHERE enabled = 1 ORDER BY name")?;
    let checks = stmt.query_map([], row_to_check)?.filter_map(|r| r.ok()).collect();
    Ok(checks)
}

pub fn set_enabled(conn: &Connection, name: &str, enabled: bool) -> Result<()> {
    let n = conn.execute(
        "UPDATE heartbeat_checks SET enabled = ?1 WHERE name = ?2",
        rusqlite::params![enabled, name],
    )?;
    if n == 0 {
        return Err(SchedulerError::HeartbeatCheckNotFound(name.to_string()));
    }
    Ok(())
}

pub fn delete(conn: &Connection, name: &str) -> Result<()> {
    let n = conn.execute("DELETE FROM heartbeat_checks WHERE name = ?1", [name])?;
    if n == 0 {
        return Err(SchedulerError::HeartbeatCheckNotFound(name.to_string()));
    }
    Ok(())
}

/// Compose the prompt asking the Agent to answer `HEARTBEAT_OK` or raise an alert.
///
/// Returns `None` if there are no enabled checks to run.
pub fn build_prompt(checks: &[HeartbeatCheck]) -> Option<String> {
    if checks.is_empty() {
        return None;
    }
    let mut prompt = String::from(
        "Run the following health checks. If everything is fine, respond with exactly \
         HEARTBEAT_OK and nothing else. If anything looks wrong, describe the problem \
         in a short message suitable for posting directly to the user.\n\n",
    );
    for check in checks {
        prompt.push_str("- ");
        prompt.push_str(&check.prompt);
        prompt.push('\n');
    }
    Some(prompt)
}

/// Whether the Agent's raw response indicates every check passed.
pub fn is_ok(response: &str) -> bool {
    response.contains(HEARTBEAT_OK)
}
