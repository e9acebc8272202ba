//! Action protocol: parse and execute `megobari` action blocks embedded in
//! agent replies.
//!
//! The agent may end a turn with one or more fenced blocks tagged
//! ```` ```megobari ```` containing a JSON object with a required `action`
//! field. Blocks that fail to parse are left untouched in the visible text —
//! the agent gets to see its own mistake rather than have it silently eaten.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use skynet_memory::{MemoryCategory, MemoryManager};

use crate::transport::Transport;

fn block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```megobari\s*\n(.*?)\n\s*```").unwrap())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedAction {
    pub action: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// Extract `megobari` blocks from `text`. Returns the cleaned text (blocks
/// removed, run of 3+ newlines collapsed to 2, trimmed) plus the list of
/// successfully parsed actions. Malformed or `action`-less blocks are left in
/// place in the returned text.
pub fn parse_actions(text: &str) -> (String, Vec<ParsedAction>) {
    let re = block_re();
    let mut actions = Vec::new();
    let mut spans_to_remove: Vec<(usize, usize)> = Vec::new();

    for caps in re.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        let raw_json = caps.get(1).unwrap().as_str().trim();
        match serde_json::from_str::<serde_json::Value>(raw_json) {
            Ok(value) if value.get("action").is_some() => match serde_json::from_value::<ParsedAction>(value) {
                Ok(parsed) => {
                    actions.push(parsed);
                    spans_to_remove.push((whole.start(), whole.end()));
                }
                Err(e) => warn!(%e, block = %clip(raw_json, 200), "megobari block has 'action' but failed to decode"),
            },
            Ok(_) => warn!(block = %clip(raw_json, 200), "megobari block missing 'action' field"),
            Err(e) => warn!(%e, block = %clip(raw_json, 200), "invalid JSON in megobari block"),
        }
    }

    let mut cleaned = text.to_string();
    for (start, end) in spans_to_remove.into_iter().rev() {
        cleaned.replace_range(start..end, "");
    }

    let collapse_re = {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap())
    };
    let cleaned = collapse_re.replace_all(&cleaned, "\n\n").trim().to_string();

    (cleaned, actions)
}

fn clip(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

/// Execute every parsed action in order. One action's failure never blocks
/// the rest; every failure is returned as a short human-readable string for
/// the Turn Engine to post as a warning reply.
pub async fn execute_actions(actions: &[ParsedAction], transport: &dyn Transport, memory: &MemoryManager, chat_id: i64) -> Vec<String> {
    let mut errors = Vec::new();
    for action in actions {
        let result = match action.action.as_str() {
            "send_file" => execute_send_file(action, transport, chat_id, false).await,
            "send_photo" => execute_send_file(action, transport, chat_id, true).await,
            "restart" => execute_restart(transport, chat_id).await,
            "memory_set" => execute_memory_set(action, memory),
            "memory_delete" => execute_memory_delete(action, memory),
            "memory_list" => execute_memory_list(action, memory),
            other => Err(format!("unknown action type: {other}")),
        };
        if let Err(e) = result {
            errors.push(e);
        }
    }
    errors
}

async fn execute_send_file(action: &ParsedAction, transport: &dyn Transport, chat_id: i64, as_photo: bool) -> Result<(), String> {
    let raw_path = action.path.as_deref().ok_or_else(|| format!("{}: missing 'path'", action.action))?;
    let expanded = shellexpand_tilde(raw_path);
    let resolved = std::fs::canonicalize(&expanded).map_err(|_| format!("{}: file not found: {expanded}", action.action))?;
    if !resolved.is_file() {
        return Err(format!("{}: not a regular file: {}", action.action, resolved.display()));
    }
    let result = if as_photo {
        transport.send_photo(chat_id, &resolved, action.caption.as_deref()).await
    } else {
        transport.send_file(chat_id, &resolved, action.caption.as_deref()).await
    };
    result.map_err(|e| format!("{}: failed to send {}: {e}", action.action, resolved.display()))
}

fn shellexpand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{home}/{rest}");
        }
    }
    path.to_string()
}

async fn execute_restart(transport: &dyn Transport, chat_id: i64) -> Result<(), String> {
    save_restart_marker(chat_id).map_err(|e| format!("restart: failed to save marker: {e}"))?;
    let _ = transport.reply(chat_id, "\u{1F504} Restarting...").await;
    do_restart();
    Ok(())
}

fn restart_marker_path() -> std::path::PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    std::path::Path::new(&home).join(".skynet").join("restart_marker.json")
}

fn save_restart_marker(chat_id: i64) -> std::io::Result<()> {
    let path = restart_marker_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::json!({ "chat_id": chat_id }).to_string())
}

/// On startup, consume a pending restart marker: returns the chat id to
/// notify, if a restart was in flight, and removes the marker file.
pub fn take_restart_marker() -> Option<i64> {
    let path = restart_marker_path();
    let contents = std::fs::read_to_string(&path).ok()?;
    let _ = std::fs::remove_file(&path);
    serde_json::from_str::<serde_json::Value>(&contents).ok()?.get("chat_id")?.as_i64()
}

/// Replace the current process image with a fresh copy of itself, preserving
/// argv and environment. Never returns on success.
#[cfg(unix)]
fn do_restart() {
    use std::os::unix::process::CommandExt;
    let exe = std::env::current_exe().unwrap_or_else(|_| "claude".into());
    let args: Vec<String> = std::env::args().skip(1).collect();
    let err = std::process::Command::new(exe).args(args).exec();
    warn!("restart exec failed: {err}");
}

#[cfg(not(unix))]
fn do_restart() {
    warn!("restart action is unsupported on this platform");
}

fn execute_memory_set(action: &ParsedAction, memory: &MemoryManager) -> Result<(), String> {
    let category = parse_category(action)?;
    let key = action.key.as_deref().ok_or("memory_set: missing 'key'")?;
    let value = action.value.as_deref().ok_or("memory_set: missing 'value'")?;
    memory.learn(None, category, key, value, None).map_err(|e| format!("memory_set: {e}"))
}

fn execute_memory_delete(action: &ParsedAction, memory: &MemoryManager) -> Result<(), String> {
    let category = parse_category(action)?;
    let key = action.key.as_deref().ok_or("memory_delete: missing 'key'")?;
    memory.forget(None, category, key).map_err(|e| format!("memory_delete: {e}"))
}

fn execute_memory_list(action: &ParsedAction, memory: &MemoryManager) -> Result<(), String> {
    let category = parse_category(action)?;
    let key = action.key.as_deref().ok_or("memory_list: missing 'key'")?;
    memory.get_memory(None, category, key).map(|_| ()).map_err(|e| format!("memory_list: {e}"))
}

fn parse_category(action: &ParsedAction) -> Result<MemoryCategory, String> {
    let raw = action.category.as_deref().ok_or("missing 'category'")?;
    raw.parse().map_err(|_| format!("unknown memory category: {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_valid_action_block() {
        let text = "Here you go:\n```megobari\n{\"action\": \"send_file\", \"path\": \"/tmp/x.txt\"}\n```\nDone.";
        let (cleaned, actions) = parse_actions(text);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action, "send_file");
        assert!(!cleaned.contains("megobari"));
        assert!(cleaned.contains("Here you go"));
        assert!(cleaned.contains("Done."));
    }

    #[test]
    fn leaves_malformed_block_in_text() {
        let text = "before\n```megobari\nnot json\n```\nafter";
        let (cleaned, actions) = parse_actions(text);
        assert!(actions.is_empty());
        assert!(cleaned.contains("not json"));
    }

    #[test]
    fn leaves_block_missing_action_field_in_text() {
        let text = "```megobari\n{\"path\": \"/tmp/x\"}\n```";
        let (_cleaned, actions) = parse_actions(text);
        assert!(actions.is_empty());
    }

    #[test]
    fn collapses_leftover_blank_lines() {
        let text = "para one\n\n```megobari\n{\"action\": \"restart\"}\n```\n\npara two";
        let (cleaned, actions) = parse_actions(text);
        assert_eq!(actions.len(), 1);
        assert!(!cleaned.contains("\n\n\n"));
    }

    #[test]
    fn parses_multiple_blocks_in_order() {
        let text = "```megobari\n{\"action\": \"memory_set\", \"category\": \"fact\", \"key\": \"k\", \"value\": \"v\"}\n```\n```megobari\n{\"action\": \"restart\"}\n```";
        let (_cleaned, actions) = parse_actions(text);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].action, "memory_set");
        assert_eq!(actions[1].action, "restart");
    }

    #[test]
    fn tilde_expansion_uses_home_env() {
        std::env::set_var("HOME", "/home/tester");
        assert_eq!(shellexpand_tilde("~/reports/x.md"), "/home/tester/reports/x.md");
    }
}
