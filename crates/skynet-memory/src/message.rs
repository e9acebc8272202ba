use rusqlite::Connection;

use crate::error::Result;
use crate::types::{Message, MessageRole};

/// Append a message and sync the FTS index. Messages are never edited once
/// written.
pub fn append(
    conn: &Connection,
    session_name: &str,
    role: MessageRole,
    content: &str,
    user_id: Option<&str>,
) -> Result<Message> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO messages (session_name, role, content, summarized, user_id, created_at)
         VALUES (?1, ?2, ?3, 0, ?4, ?5)",
        rusqlite::params![session_name, role.to_string(), content, user_id, now],
    )?;
    let id = conn.last_insert_rowid();
    conn.execute(
        "INSERT INTO messages_fts(rowid, content) VALUES (?1, ?2)",
        rusqlite::params![id, content],
    )?;

    Ok(Message {
        id,
        session_name: session_name.to_string(),
        role,
        content: content.to_string(),
        summarized: false,
        user_id: user_id.map(str::to_string),
        created_at: now,
    })
}

pub fn count_unsummarized(conn: &Connection, session_name: &str) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE session_name = ?1 AND summarized = 0",
        rusqlite::params![session_name],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Unsummarized messages for a session, oldest first.
pub fn unsummarized(conn: &Connection, session_name: &str) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT id, session_name, role, content, summarized, user_id, created_at
         FROM messages WHERE session_name = ?1 AND summarized = 0
         ORDER BY created_at ASC, id ASC",
    )?;
    let rows = stmt.query_map(rusqlite::params![session_name], row_to_message)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

/// Mark a batch of message ids as folded into a summary. Call inside the
/// same transaction as the summary insert.
pub fn mark_summarized(conn: &Connection, ids: &[i64]) -> Result<()> {
    for id in ids {
        conn.execute(
            "UPDATE messages SET summarized = 1 WHERE id = ?1",
            rusqlite::params![id],
        )?;
    }
    Ok(())
}

/// Most recent messages for a session, newest first.
pub fn recent(conn: &Connection, session_name: &str, limit: usize) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT id, session_name, role, content, summarized, user_id, created_at
         FROM messages WHERE session_name = ?1
         ORDER BY created_at DESC, id DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(rusqlite::params![session_name, limit as i64], row_to_message)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

/// Full-text search over message bodies, optionally scoped to one session.
pub fn search(
    conn: &Connection,
    session_name: Option<&str>,
    query: &str,
    limit: usize,
) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.session_name, m.role, m.content, m.summarized, m.user_id, m.created_at
         FROM messages m
         JOIN messages_fts f ON m.id = f.rowid
         WHERE messages_fts MATCH ?1
           AND (?2 IS NULL OR m.session_name = ?2)
         ORDER BY rank LIMIT ?3",
    )?;
    let rows = stmt.query_map(
        rusqlite::params![query, session_name, limit as i64],
        row_to_message,
    )?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let role_str: String = row.get(2)?;
    Ok(Message {
        id: row.get(0)?,
        session_name: row.get(1)?,
        role: role_str.parse().unwrap_or(MessageRole::User),
        content: row.get(3)?,
        summarized: row.get::<_, i64>(4)? != 0,
        user_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}
