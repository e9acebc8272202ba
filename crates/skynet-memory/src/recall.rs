use rusqlite::Connection;
use tracing::debug;

use crate::types::RecallResult;
use crate::{memory, persona, summary};

const MAX_SUMMARIES: usize = 3;
const MAX_MEMORIES: usize = 20;

/// Assemble everything the Turn Engine needs to prime an agent invocation.
/// Best-effort: any failure along the way collapses to an empty result
/// rather than failing the turn — recall enriches a turn, it never blocks one.
pub fn build_recall_context(
    conn: &Connection,
    session_name: &str,
    user_id: Option<&str>,
) -> RecallResult {
    match try_build(conn, session_name, user_id) {
        Ok(result) => result,
        Err(err) => {
            debug!(%err, session_name, "recall context build failed, returning empty result");
            RecallResult::default()
        }
    }
}

fn try_build(
    conn: &Connection,
    session_name: &str,
    user_id: Option<&str>,
) -> crate::error::Result<RecallResult> {
    let mut blocks: Vec<String> = Vec::new();

    let mut summaries = summary::recent(conn, session_name, MAX_SUMMARIES)?;
    summaries.reverse(); // oldest first inside the block
    if !summaries.is_empty() {
        let mut block = String::from("## Recent summary\n");
        for s in &summaries {
            let text = s.short_summary.as_deref().unwrap_or(&s.full_summary);
            block.push_str("- ");
            block.push_str(text);
            block.push('\n');
        }
        blocks.push(block);
    }

    let mut persona_mcp_servers = Vec::new();
    let mut persona_skills = Vec::new();
    if let Some(default) = persona::default_persona(conn)? {
        persona_mcp_servers = default.mcp_servers.clone();
        persona_skills = default.skills.clone();

        let mut block = String::new();
        if let Some(prompt) = &default.system_prompt {
            block.push_str(prompt);
            block.push('\n');
        }
        if !default.skills.is_empty() {
            block.push_str(&format!("Skills: {}\n", default.skills.join(", ")));
        }
        if !default.mcp_servers.is_empty() {
            block.push_str(&format!("MCP servers: {}\n", default.mcp_servers.join(", ")));
        }
        if !block.is_empty() {
            blocks.push(block);
        }
    }

    let memories = memory::list(conn, user_id, MAX_MEMORIES)?;
    if !memories.is_empty() {
        let mut block = String::from("## Memory\n");
        for m in &memories {
            block.push_str(&format!("- [{}] {}: {}\n", m.category, m.key, m.content));
        }
        blocks.push(block);
    }

    let context = if blocks.is_empty() {
        None
    } else {
        Some(blocks.join("\n"))
    };

    Ok(RecallResult {
        context,
        persona_mcp_servers,
        persona_skills,
    })
}
