//! Deterministic (tool_name, inputs) → short status line mapping, plus a
//! compact grouped summary of everything a turn's tools did.

use std::collections::HashMap;

use crate::invoker::ToolUseEvent;

const DESCRIPTION_TRUNCATE: usize = 40;

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn clip(s: &str, limit: usize) -> String {
    let clipped: String = s.chars().take(limit).collect();
    if clipped.chars().count() < s.chars().count() {
        format!("{clipped}…")
    } else {
        clipped
    }
}

/// One short line describing what a tool call is doing, for a live status
/// placeholder or message.
pub fn status_line(tool: &ToolUseEvent) -> String {
    let input = &tool.input;
    match tool.name.as_str() {
        "Read" => match input.get("file_path").and_then(|v| v.as_str()) {
            Some(p) => format!("Reading {}…", basename(p)),
            None => "Reading file…".to_string(),
        },
        "Write" => match input.get("file_path").and_then(|v| v.as_str()) {
            Some(p) => format!("Writing {}…", basename(p)),
            None => "Writing file…".to_string(),
        },
        "Edit" => match input.get("file_path").and_then(|v| v.as_str()) {
            Some(p) => format!("Editing {}…", basename(p)),
            None => "Editing file…".to_string(),
        },
        "Glob" => "Searching files…".to_string(),
        "Grep" => "Searching codebase…".to_string(),
        "Bash" => match input.get("description").and_then(|v| v.as_str()) {
            Some(d) if !d.is_empty() => format!("{}…", clip(d, DESCRIPTION_TRUNCATE)),
            _ => "Running command…".to_string(),
        },
        "WebFetch" => "Fetching page…".to_string(),
        "WebSearch" => "Searching web…".to_string(),
        "Task" => "Launching agent…".to_string(),
        other => format!("{other}…"),
    }
}

/// Compact grouped post-turn summary of every tool-use, insertion order
/// preserved within each group: shell commands joined by a middle dot, file
/// ops deduplicated with `×N` counts, search patterns listed inline.
pub fn tool_summary(tools: &[ToolUseEvent]) -> String {
    if tools.is_empty() {
        return String::new();
    }

    let mut shell_cmds: Vec<String> = Vec::new();
    let mut file_ops: Vec<(String, String)> = Vec::new(); // (verb, basename), insertion order
    let mut file_op_counts: HashMap<(String, String), usize> = HashMap::new();
    let mut searches: Vec<String> = Vec::new();
    let mut other: Vec<String> = Vec::new();

    for tool in tools {
        match tool.name.as_str() {
            "Bash" => {
                let desc = tool
                    .input
                    .get("description")
                    .and_then(|v| v.as_str())
                    .or_else(|| tool.input.get("command").and_then(|v| v.as_str()))
                    .unwrap_or("command");
                shell_cmds.push(clip(desc, DESCRIPTION_TRUNCATE));
            }
            "Read" | "Write" | "Edit" => {
                let verb = match tool.name.as_str() {
                    "Read" => "Read",
                    "Write" => "Wrote",
                    _ => "Edited",
                };
                let name = tool.input.get("file_path").and_then(|v| v.as_str()).map(basename).unwrap_or("file").to_string();
                let key = (verb.to_string(), name);
                if !file_op_counts.contains_key(&key) {
                    file_ops.push(key.clone());
                }
                *file_op_counts.entry(key).or_insert(0) += 1;
            }
            "Glob" | "Grep" => {
                if let Some(pattern) = tool.input.get("pattern").and_then(|v| v.as_str()) {
                    searches.push(pattern.to_string());
                }
            }
            other_name => other.push(format!("{other_name}")),
        }
    }

    let mut parts = Vec::new();
    if !shell_cmds.is_empty() {
        parts.push(format!("Ran: {}", shell_cmds.join(" · ")));
    }
    if !file_ops.is_empty() {
        let rendered: Vec<String> = file_ops
            .iter()
            .map(|key| {
                let count = file_op_counts[key];
                if count > 1 {
                    format!("{} {} (×{count})", key.0, key.1)
                } else {
                    format!("{} {}", key.0, key.1)
                }
            })
            .collect();
        parts.push(rendered.join(", "));
    }
    if !searches.is_empty() {
        parts.push(format!("Searched: {}", searches.join(", ")));
    }
    if !other.is_empty() {
        parts.push(format!("Used: {}", other.join(", ")));
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str, input: serde_json::Value) -> ToolUseEvent {
        ToolUseEvent { id: "1".to_string(), name: name.to_string(), input }
    }

    #[test]
    fn read_status_uses_basename() {
        let t = tool("Read", serde_json::json!({"file_path": "/a/b/foo.py"}));
        assert_eq!(status_line(&t), "Reading foo.py…");
    }

    #[test]
    fn bash_status_uses_description_when_present() {
        let t = tool("Bash", serde_json::json!({"description": "run the test suite end to end with coverage", "command": "cargo test"}));
        let line = status_line(&t);
        assert!(line.starts_with("run the test suite end to"));
        assert!(line.ends_with('…'));
    }

    #[test]
    fn bash_status_falls_back_without_description() {
        let t = tool("Bash", serde_json::json!({"command": "ls"}));
        assert_eq!(status_line(&t), "Running command…");
    }

    #[test]
    fn unknown_tool_uses_name() {
        let t = tool("CustomThing", serde_json::json!({}));
        assert_eq!(status_line(&t), "CustomThing…");
    }

    #[test]
    fn summary_dedupes_file_ops_with_counts() {
        let tools = vec![
            tool("Read", serde_json::json!({"file_path": "a.rs"})),
            tool("Read", serde_json::json!({"file_path": "a.rs"})),
            tool("Write", serde_json::json!({"file_path": "b.rs"})),
        ];
        let summary = tool_summary(&tools);
        assert!(summary.contains("Read a.rs (×2)"));
        assert!(summary.contains("Wrote b.rs"));
    }

    #[test]
    fn summary_joins_shell_commands_with_middle_dot() {
        let tools = vec![tool("Bash", serde_json::json!({"description": "build"})), tool("Bash", serde_json::json!({"description": "test"}))];
        assert_eq!(tool_summary(&tools), "Ran: build · test");
    }

    #[test]
    fn empty_tools_yields_empty_summary() {
        assert_eq!(tool_summary(&[]), "");
    }
}
