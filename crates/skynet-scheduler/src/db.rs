use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduler schema in `conn`.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS cron_jobs (
            name            TEXT    NOT NULL PRIMARY KEY,
            cron_expression TEXT    NOT NULL,
            prompt          TEXT    NOT NULL,
            session_name    TEXT    NOT NULL,
            isolated        INTEGER NOT NULL DEFAULT 0,
            enabled         INTEGER NOT NULL DEFAULT 1,
            timezone        TEXT,
            last_run_at     TEXT,
            created_at      TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS heartbeat_checks (
            name    TEXT    NOT NULL PRIMARY KEY,
            prompt  TEXT    NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1
        ) STRICT;

        -- Small key/value table for scheduler-wide state that must survive a
        -- restart: last heartbeat fire time, last swept monitor hour.
        CREATE TABLE IF NOT EXISTS scheduler_state (
            key   TEXT NOT NULL PRIMARY KEY,
            value TEXT NOT NULL
        ) STRICT;
        ",
    )?;
    Ok(())
}
