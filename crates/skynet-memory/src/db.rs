use rusqlite::{Connection, Result};

/// Initialise every table this crate owns. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_messages_table(conn)?;
    create_messages_fts(conn)?;
    create_summaries_table(conn)?;
    create_memory_table(conn)?;
    create_personas_table(conn)?;
    create_usage_table(conn)?;
    create_dashboard_tokens_table(conn)?;
    Ok(())
}

fn create_messages_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            session_name TEXT NOT NULL,
            role         TEXT NOT NULL,
            content      TEXT NOT NULL,
            summarized   INTEGER NOT NULL DEFAULT 0,
            user_id      TEXT,
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_session
            ON messages(session_name, created_at);
        CREATE INDEX IF NOT EXISTS idx_messages_unsummarized
            ON messages(session_name, summarized);",
    )
}

/// External-content FTS5 index over message bodies, synced by hand on every
/// insert (content='' tables don't maintain themselves).
fn create_messages_fts(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts
            USING fts5(content, content='messages', content_rowid='id');",
    )
}

fn create_summaries_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS conversation_summaries (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            session_name  TEXT NOT NULL,
            full_summary  TEXT NOT NULL,
            short_summary TEXT,
            topics        TEXT NOT NULL DEFAULT '[]',
            message_count INTEGER NOT NULL DEFAULT 0,
            is_milestone  INTEGER NOT NULL DEFAULT 0,
            user_id       TEXT,
            persona_name  TEXT,
            created_at    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_summaries_session
            ON conversation_summaries(session_name, created_at DESC);",
    )
}

fn create_memory_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS memory (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id    TEXT,
            category   TEXT NOT NULL,
            key        TEXT NOT NULL,
            content    TEXT NOT NULL,
            metadata   TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(user_id, category, key)
        );
        CREATE INDEX IF NOT EXISTS idx_memory_user
            ON memory(user_id, created_at DESC);",
    )
}

fn create_personas_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS personas (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            name          TEXT NOT NULL UNIQUE,
            description   TEXT,
            system_prompt TEXT,
            mcp_servers   TEXT NOT NULL DEFAULT '[]',
            skills        TEXT NOT NULL DEFAULT '[]',
            config        TEXT,
            is_default    INTEGER NOT NULL DEFAULT 0
        );",
    )
}

fn create_usage_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS usage_records (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            session_name   TEXT NOT NULL,
            user_id        TEXT,
            input_tokens   INTEGER NOT NULL DEFAULT 0,
            output_tokens  INTEGER NOT NULL DEFAULT 0,
            cost_usd       REAL NOT NULL DEFAULT 0.0,
            duration_ms    INTEGER NOT NULL DEFAULT 0,
            num_turns      INTEGER NOT NULL DEFAULT 1,
            created_at     TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_usage_session
            ON usage_records(session_name, created_at DESC);",
    )
}

fn create_dashboard_tokens_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS dashboard_tokens (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            token_hash    TEXT NOT NULL UNIQUE,
            label         TEXT NOT NULL,
            enabled       INTEGER NOT NULL DEFAULT 1,
            created_at    TEXT NOT NULL,
            last_used_at  TEXT
        );",
    )
}
