use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::error::{Result, SchedulerError};
use crate::types::CronJob;

fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<CronJob> {
    Ok(CronJob {
        name: row.get(0)?,
        cron_expression: row.get(1)?,
        prompt: row.get(2)?,
        session_name: row.get(3)?,
        isolated: row.get(4)?,
        enabled: row.get(5)?,
        timezone: row.get(6)?,
        last_run_at: row.get(7)?,
        created_at: row.get(8)?,
    })
}

const COLUMNS: &str =
    "name, cron_expression, prompt, session_name, isolated, enabled, timezone, last_run_at, created_at";

pub fn create(
    conn: &Connection,
    name: &str,
    cron_expression: &str,
    prompt: &str,
    session_name: &str,
    isolated: bool,
    timezone: Option<&str>,
) -> Result<CronJob> {
    if exists(conn, name)? {
        return Err(SchedulerError::CronJobAlreadyExists(name.to_string()));
    }
    let created_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO cron_jobs (name, cron_expression, prompt, session_name, isolated, enabled, timezone, last_run_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, NULL, ?7)",
        rusqlite::params![name, cron_expression, prompt, session_name, isolated, timezone, created_at],
    )?;
    Ok(CronJob {
        name: name.to_string(),
        cron_expression: cron_expression.to_string(),
        prompt: prompt.to_string(),
        session_name: session_name.to_string(),
        isolated,
        enabled: true,
        timezone: timezone.map(str::to_string),
        last_run_at: None,
        created_at,
    })
}

fn exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM cron_jobs WHERE name = ?1", [name], |_| Ok(()))
        .optional()?
        .is_some())
}

pub fn get(conn: &Connection, name: &str) -> Result<Option<CronJob>> {
    Ok(conn
        .query_row(&format!("SELECT {COLUMNS} FROM cron_jobs WHERE name = ?1"), [name], row_to_job)
        .optional()?)
}

pub fn list(conn: &Connection) -> Result<Vec<CronJob>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM cron_jobs ORDER BY name"))?;
    let jobs = stmt.query_map([], row_to_job)?.filter_map(|r| r.ok()).collect();
    Ok(jobs)
}

pub fn list_enabled(conn: &Connection) -> Result<Vec<CronJob>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM cron_jobs WHERE enabled = 1 ORDER BY name"
    ))?;
    let jobs = stmt.query_map([], row_to_job)?.filter_map(|r| r.ok()).collect();
    Ok(jobs)
}

pub fn set_enabled(conn: &Connection, name: &str, enabled: bool) -> Result<()> {
    let n = conn.execute("UPDATE cron_jobs SET enabled = ?1 WHERE name = ?2", rusqlite::params![enabled, name])?;
    if n == 0 {
        return Err(SchedulerError::CronJobNotFound(name.to_string()));
    }
    Ok(())
}

pub fn record_run(conn: &Connection, name: &str, at: &str) -> Result<()> {
    conn.execute("UPDATE cron_jobs SET last_run_at = ?1 WHERE name = ?2", rusqlite::params![at, name])?;
    Ok(())
}

pub fn delete(conn: &Connection, name: &str) -> Result<()> {
    let n = conn.execute("DELETE FROM cron_jobs WHERE name = ?1", [name])?;
    if n == 0 {
        return Err(SchedulerError::CronJobNotFound(name.to_string()));
    }
    Ok(())
}
