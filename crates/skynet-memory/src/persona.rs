use rusqlite::{Connection, OptionalExtension};

use crate::error::{MemoryError, Result};
use crate::types::Persona;

#[allow(clippy::too_many_arguments)]
pub fn create(
    conn: &Connection,
    name: &str,
    description: Option<&str>,
    system_prompt: Option<&str>,
    mcp_servers: &[String],
    skills: &[String],
    config: Option<&serde_json::Value>,
) -> Result<Persona> {
    let mcp_json = serde_json::to_string(mcp_servers)?;
    let skills_json = serde_json::to_string(skills)?;
    let config_json = config.map(serde_json::to_string).transpose()?;

    conn.execute(
        "INSERT INTO personas (name, description, system_prompt, mcp_servers, skills, config, is_default)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
        rusqlite::params![name, description, system_prompt, mcp_json, skills_json, config_json],
    )?;

    get(conn, name)?.ok_or_else(|| MemoryError::PersonaNotFound(name.to_string()))
}

pub fn get(conn: &Connection, name: &str) -> Result<Option<Persona>> {
    conn.query_row(
        "SELECT id, name, description, system_prompt, mcp_servers, skills, config, is_default
         FROM personas WHERE name = ?1",
        rusqlite::params![name],
        row_to_persona,
    )
    .optional()
    .map_err(MemoryError::from)
}

pub fn list(conn: &Connection) -> Result<Vec<Persona>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, system_prompt, mcp_servers, skills, config, is_default
         FROM personas ORDER BY name ASC",
    )?;
    let rows = stmt.query_map([], row_to_persona)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn default_persona(conn: &Connection) -> Result<Option<Persona>> {
    conn.query_row(
        "SELECT id, name, description, system_prompt, mcp_servers, skills, config, is_default
         FROM personas WHERE is_default = 1 LIMIT 1",
        [],
        row_to_persona,
    )
    .optional()
    .map_err(MemoryError::from)
}

/// Make `name` the default persona, clearing the flag on every other row in
/// the same transaction — this is what keeps the "at most one default"
/// invariant true across restarts.
pub fn set_default(conn: &mut Connection, name: &str) -> Result<()> {
    let tx = conn.transaction()?;
    let rows = tx.execute(
        "UPDATE personas SET is_default = 0 WHERE is_default = 1",
        [],
    )?;
    let _ = rows;
    let changed = tx.execute(
        "UPDATE personas SET is_default = 1 WHERE name = ?1",
        rusqlite::params![name],
    )?;
    if changed == 0 {
        return Err(MemoryError::PersonaNotFound(name.to_string()));
    }
    tx.commit()?;
    Ok(())
}

pub fn update_prompt(conn: &Connection, name: &str, system_prompt: &str) -> Result<()> {
    let changed = conn.execute(
        "UPDATE personas SET system_prompt = ?1 WHERE name = ?2",
        rusqlite::params![system_prompt, name],
    )?;
    if changed == 0 {
        return Err(MemoryError::PersonaNotFound(name.to_string()));
    }
    Ok(())
}

pub fn update_mcp_servers(conn: &Connection, name: &str, mcp_servers: &[String]) -> Result<()> {
    let json = serde_json::to_string(mcp_servers)?;
    let changed = conn.execute(
        "UPDATE personas SET mcp_servers = ?1 WHERE name = ?2",
        rusqlite::params![json, name],
    )?;
    if changed == 0 {
        return Err(MemoryError::PersonaNotFound(name.to_string()));
    }
    Ok(())
}

pub fn update_skills(conn: &Connection, name: &str, skills: &[String]) -> Result<()> {
    let json = serde_json::to_string(skills)?;
    let changed = conn.execute(
        "UPDATE personas SET skills = ?1 WHERE name = ?2",
        rusqlite::params![json, name],
    )?;
    if changed == 0 {
        return Err(MemoryError::PersonaNotFound(name.to_string()));
    }
    Ok(())
}

pub fn delete(conn: &Connection, name: &str) -> Result<()> {
    let changed = conn.execute("DELETE FROM personas WHERE name = ?1", rusqlite::params![name])?;
    if changed == 0 {
        return Err(MemoryError::PersonaNotFound(name.to_string()));
    }
    Ok(())
}

fn row_to_persona(row: &rusqlite::Row<'_>) -> rusqlite::Result<Persona> {
    let mcp_json: String = row.get(4)?;
    let skills_json: String = row.get(5)?;
    let config_json: Option<String> = row.get(6)?;
    Ok(Persona {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        system_prompt: row.get(3)?,
        mcp_servers: serde_json::from_str(&mcp_json).unwrap_or_default(),
        skills: serde_json::from_str(&skills_json).unwrap_or_default(),
        config: config_json.and_then(|s| serde_json::from_str(&s).ok()),
        is_default: row.get::<_, i64>(7)? != 0,
    })
}
