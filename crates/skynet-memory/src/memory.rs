use rusqlite::{Connection, OptionalExtension};

use crate::error::{MemoryError, Result};
use crate::types::{Memory, MemoryCategory};

/// SQLite's `UNIQUE` treats every `NULL` as distinct, which would let a
/// single-principal bridge (where `user_id` is almost always absent) insert
/// unlimited duplicate `(category, key)` rows. Coalescing `None` to `""` at
/// the storage boundary keeps the unique constraint meaningful.
fn storage_user_id(user_id: Option<&str>) -> &str {
    user_id.unwrap_or("")
}

fn api_user_id(stored: String) -> Option<String> {
    if stored.is_empty() {
        None
    } else {
        Some(stored)
    }
}

/// Upsert a memory entry. Content and metadata always overwrite on conflict —
/// there is no confidence-scoring system here, the caller (Action Executor or
/// a slash command) is always an explicit, trusted write.
pub fn learn(
    conn: &Connection,
    user_id: Option<&str>,
    category: MemoryCategory,
    key: &str,
    content: &str,
    metadata: Option<&serde_json::Value>,
) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    let cat = category.to_string();
    let meta_json = metadata.map(serde_json::to_string).transpose()?;

    conn.execute(
        "INSERT INTO memory (user_id, category, key, content, metadata, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(user_id, category, key)
         DO UPDATE SET content = excluded.content, metadata = excluded.metadata, updated_at = excluded.updated_at",
        rusqlite::params![
            storage_user_id(user_id),
            cat,
            key,
            content,
            meta_json,
            now
        ],
    )?;
    Ok(())
}

pub fn forget(
    conn: &Connection,
    user_id: Option<&str>,
    category: MemoryCategory,
    key: &str,
) -> Result<()> {
    let rows = conn.execute(
        "DELETE FROM memory WHERE user_id = ?1 AND category = ?2 AND key = ?3",
        rusqlite::params![storage_user_id(user_id), category.to_string(), key],
    )?;
    if rows == 0 {
        return Err(MemoryError::NotFound {
            category: category.to_string(),
            key: key.to_string(),
        });
    }
    Ok(())
}

pub fn get(
    conn: &Connection,
    user_id: Option<&str>,
    category: MemoryCategory,
    key: &str,
) -> Result<Option<Memory>> {
    conn.query_row(
        "SELECT id, user_id, category, key, content, metadata, created_at, updated_at
         FROM memory WHERE user_id = ?1 AND category = ?2 AND key = ?3",
        rusqlite::params![storage_user_id(user_id), category.to_string(), key],
        row_to_memory,
    )
    .optional()
    .map_err(MemoryError::from)
}

/// List memories, most recent first. `user_id = None` lists entries with no
/// owner; pass a value to filter to one principal's memories.
pub fn list(conn: &Connection, user_id: Option<&str>, limit: usize) -> Result<Vec<Memory>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, category, key, content, metadata, created_at, updated_at
         FROM memory WHERE user_id = ?1
         ORDER BY created_at DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(
        rusqlite::params![storage_user_id(user_id), limit as i64],
        row_to_memory,
    )?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

fn row_to_memory(row: &rusqlite::Row<'_>) -> rusqlite::Result<Memory> {
    let cat_str: String = row.get(2)?;
    let meta_str: Option<String> = row.get(5)?;
    let metadata = meta_str.and_then(|s| serde_json::from_str(&s).ok());
    let stored_user: String = row.get(1)?;
    Ok(Memory {
        id: row.get(0)?,
        user_id: api_user_id(stored_user),
        category: cat_str.parse().unwrap_or(MemoryCategory::Context),
        key: row.get(3)?,
        content: row.get(4)?,
        metadata,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
