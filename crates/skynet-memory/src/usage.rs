use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;
use crate::types::{DashboardToken, UsageRecord, UsageTotals};

#[allow(clippy::too_many_arguments)]
pub fn record(
    conn: &Connection,
    session_name: &str,
    user_id: Option<&str>,
    input_tokens: u32,
    output_tokens: u32,
    cost_usd: f64,
    duration_ms: u64,
    num_turns: u32,
) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO usage_records
            (session_name, user_id, input_tokens, output_tokens, cost_usd, duration_ms, num_turns, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![session_name, user_id, input_tokens, output_tokens, cost_usd, duration_ms as i64, num_turns, now],
    )?;
    Ok(())
}

/// Aggregate totals for one session, or across every session when `session_name` is `None`.
pub fn totals(conn: &Connection, session_name: Option<&str>) -> Result<UsageTotals> {
    let row = match session_name {
        Some(name) => conn.query_row(
            "SELECT COALESCE(SUM(num_turns), 0), COALESCE(SUM(input_tokens), 0),
                    COALESCE(SUM(output_tokens), 0), COALESCE(SUM(cost_usd), 0.0)
             FROM usage_records WHERE session_name = ?1",
            [name],
            row_to_totals,
        ),
        None => conn.query_row(
            "SELECT COALESCE(SUM(num_turns), 0), COALESCE(SUM(input_tokens), 0),
                    COALESCE(SUM(output_tokens), 0), COALESCE(SUM(cost_usd), 0.0)
             FROM usage_records",
            [],
            row_to_totals,
        ),
    }?;
    Ok(row)
}

fn row_to_totals(row: &rusqlite::Row<'_>) -> rusqlite::Result<UsageTotals> {
    Ok(UsageTotals {
        num_turns: row.get(0)?,
        input_tokens: row.get(1)?,
        output_tokens: row.get(2)?,
        cost_usd: row.get(3)?,
    })
}

pub fn list_records(conn: &Connection, session_name: Option<&str>, limit: usize) -> Result<Vec<UsageRecord>> {
    let mut stmt = match session_name {
        Some(_) => conn.prepare(
            "SELECT id, session_name, user_id, input_tokens, output_tokens, cost_usd, duration_ms, num_turns, created_at
             FROM usage_records WHERE session_name = ?1 ORDER BY created_at DESC LIMIT ?2",
        )?,
        None => conn.prepare(
            "SELECT id, session_name, user_id, input_tokens, output_tokens, cost_usd, duration_ms, num_turns, created_at
             FROM usage_records ORDER BY created_at DESC LIMIT ?1",
        )?,
    };
    let rows = match session_name {
        Some(name) => stmt.query_map(rusqlite::params![name, limit as i64], row_to_record)?,
        None => stmt.query_map(rusqlite::params![limit as i64], row_to_record)?,
    };
    Ok(rows.filter_map(|r| r.ok()).collect())
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<UsageRecord> {
    let duration_ms: i64 = row.get(6)?;
    Ok(UsageRecord {
        id: row.get(0)?,
        session_name: row.get(1)?,
        user_id: row.get(2)?,
        input_tokens: row.get(3)?,
        output_tokens: row.get(4)?,
        cost_usd: row.get(5)?,
        duration_ms: duration_ms as u64,
        num_turns: row.get(7)?,
        created_at: row.get(8)?,
    })
}

// -- dashboard tokens -----------------------------------------------------

pub fn create_token(conn: &Connection, label: &str, token_hash: &str) -> Result<DashboardToken> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO dashboard_tokens (token_hash, label, enabled, created_at, last_used_at)
         VALUES (?1, ?2, 1, ?3, NULL)",
        rusqlite::params![token_hash, label, now],
    )?;
    let id = conn.last_insert_rowid();
    Ok(DashboardToken { id, label: label.to_string(), enabled: true, created_at: now, last_used_at: None })
}

pub fn list_tokens(conn: &Connection) -> Result<Vec<DashboardToken>> {
    let mut stmt = conn.prepare(
        "SELECT id, label, enabled, created_at, last_used_at FROM dashboard_tokens ORDER BY created_at DESC",
    )?;
    let rows = stmt.query_map([], row_to_token)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn revoke_token(conn: &Connection, token_hash: &str) -> Result<bool> {
    let rows = conn.execute(
        "UPDATE dashboard_tokens SET enabled = 0 WHERE token_hash = ?1",
        [token_hash],
    )?;
    Ok(rows > 0)
}

/// Verify a token hash against an enabled row, stamping `last_used_at` on match.
pub fn verify_token(conn: &Connection, token_hash: &str) -> Result<Option<DashboardToken>> {
    let found: Option<DashboardToken> = conn
        .query_row(
            "SELECT id, label, enabled, created_at, last_used_at FROM dashboard_tokens
             WHERE token_hash = ?1 AND enabled = 1",
            [token_hash],
            row_to_token,
        )
        .optional()?;
    if let Some(t) = &found {
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute("UPDATE dashboard_tokens SET last_used_at = ?1 WHERE id = ?2", rusqlite::params![now, t.id])?;
    }
    Ok(found)
}

fn row_to_token(row: &rusqlite::Row<'_>) -> rusqlite::Result<DashboardToken> {
    Ok(DashboardToken {
        id: row.get(0)?,
        label: row.get(1)?,
        enabled: row.get::<_, i64>(2)? != 0,
        created_at: row.get(3)?,
        last_used_at: row.get(4)?,
    })
}
