use rusqlite::Connection;

use crate::error::Result;

/// Initialise the monitor schema. Foreign keys are enabled so deleting a
/// topic cascades through its entities, resources, snapshots and digests.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS monitor_topics (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE,
            description TEXT,
            created_at  TEXT NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS monitor_entities (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            topic_id    INTEGER NOT NULL REFERENCES monitor_topics(id) ON DELETE CASCADE,
            name        TEXT NOT NULL,
            url         TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            created_at  TEXT NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS monitor_resources (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_id       INTEGER NOT NULL REFERENCES monitor_entities(id) ON DELETE CASCADE,
            topic_id        INTEGER NOT NULL REFERENCES monitor_topics(id) ON DELETE CASCADE,
            name            TEXT NOT NULL,
            url             TEXT NOT NULL,
            resource_type   TEXT NOT NULL,
            last_checked_at TEXT,
            last_changed_at TEXT,
            enabled         INTEGER NOT NULL DEFAULT 1
        ) STRICT;

        CREATE TABLE IF NOT EXISTS monitor_snapshots (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            resource_id      INTEGER NOT NULL REFERENCES monitor_resources(id) ON DELETE CASCADE,
            content_hash     TEXT NOT NULL,
            content_markdown TEXT NOT NULL,
            has_changes      INTEGER NOT NULL,
            fetched_at       TEXT NOT NULL
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_snapshots_resource ON monitor_snapshots (resource_id, fetched_at DESC);

        CREATE TABLE IF NOT EXISTS monitor_digests (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            topic_id    INTEGER NOT NULL REFERENCES monitor_topics(id) ON DELETE CASCADE,
            entity_id   INTEGER NOT NULL REFERENCES monitor_entities(id) ON DELETE CASCADE,
            resource_id INTEGER NOT NULL REFERENCES monitor_resources(id) ON DELETE CASCADE,
            snapshot_id INTEGER NOT NULL REFERENCES monitor_snapshots(id) ON DELETE CASCADE,
            summary     TEXT NOT NULL,
            change_type TEXT NOT NULL,
            created_at  TEXT NOT NULL
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_digests_topic ON monitor_digests (topic_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS monitor_subscribers (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            channel_type    TEXT NOT NULL,
            channel_config  TEXT NOT NULL,
            topic_id        INTEGER REFERENCES monitor_topics(id) ON DELETE CASCADE,
            entity_id       INTEGER REFERENCES monitor_entities(id) ON DELETE CASCADE,
            resource_id     INTEGER REFERENCES monitor_resources(id) ON DELETE CASCADE,
            enabled         INTEGER NOT NULL DEFAULT 1
        ) STRICT;
        ",
    )?;
    Ok(())
}
