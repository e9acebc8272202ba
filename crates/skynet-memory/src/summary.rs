use rusqlite::Connection;

use crate::error::Result;
use crate::types::ConversationSummary;

#[allow(clippy::too_many_arguments)]
pub fn insert(
    conn: &Connection,
    session_name: &str,
    full_summary: &str,
    short_summary: Option<&str>,
    topics: &[String],
    message_count: u32,
    is_milestone: bool,
    user_id: Option<&str>,
    persona_name: Option<&str>,
) -> Result<i64> {
    let now = chrono::Utc::now().to_rfc3339();
    let topics_json = serde_json::to_string(topics)?;
    conn.execute(
        "INSERT INTO conversation_summaries
         (session_name, full_summary, short_summary, topics, message_count,
          is_milestone, user_id, persona_name, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            session_name,
            full_summary,
            short_summary,
            topics_json,
            message_count,
            is_milestone as i64,
            user_id,
            persona_name,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent summaries for a session, newest first.
pub fn recent(conn: &Connection, session_name: &str, limit: usize) -> Result<Vec<ConversationSummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, session_name, full_summary, short_summary, topics, message_count,
                is_milestone, user_id, persona_name, created_at
         FROM conversation_summaries WHERE session_name = ?1
         ORDER BY created_at DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(rusqlite::params![session_name, limit as i64], row_to_summary)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn milestones(conn: &Connection, session_name: &str, limit: usize) -> Result<Vec<ConversationSummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, session_name, full_summary, short_summary, topics, message_count,
                is_milestone, user_id, persona_name, created_at
         FROM conversation_summaries WHERE session_name = ?1 AND is_milestone = 1
         ORDER BY created_at DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(rusqlite::params![session_name, limit as i64], row_to_summary)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn search(conn: &Connection, query: &str, limit: usize) -> Result<Vec<ConversationSummary>> {
    let like = format!("%{query}%");
    let mut stmt = conn.prepare(
        "SELECT id, session_name, full_summary, short_summary, topics, message_count,
                is_milestone, user_id, persona_name, created_at
         FROM conversation_summaries
         WHERE full_summary LIKE ?1 OR short_summary LIKE ?1
         ORDER BY created_at DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(rusqlite::params![like, limit as i64], row_to_summary)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationSummary> {
    let topics_json: String = row.get(4)?;
    Ok(ConversationSummary {
        id: row.get(0)?,
        session_name: row.get(1)?,
        full_summary: row.get(2)?,
        short_summary: row.get(3)?,
        topics: serde_json::from_str(&topics_json).unwrap_or_default(),
        message_count: row.get::<_, i64>(5)? as u32,
        is_milestone: row.get::<_, i64>(6)? != 0,
        user_id: row.get(7)?,
        persona_name: row.get(8)?,
        created_at: row.get(9)?,
    })
}
