//! MCP stdio server for the coding-agent CLI.
//!
//! Exposes the long-term memory store as MCP tools so the agent can read
//! and write facts about its principal from inside a turn, the same way it
//! reaches for `Bash` or `Read`. Wired into every turn by
//! `AgentInvoker::resolve_mcp_binary`/`write_mcp_config`.
//!
//! Protocol: JSON-RPC 2.0 over stdin/stdout, one JSON object per line.

use serde_json::{json, Value};
use skynet_memory::{MemoryCategory, MemoryManager};

use skynet_core::config::BridgeConfig;

/// Run the MCP bridge stdio loop. Blocks until stdin is closed.
pub async fn run(config: &BridgeConfig) -> anyhow::Result<()> {
    let conn = rusqlite::Connection::open(&config.database.path)?;
    let memory = MemoryManager::new(conn)?;

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();

    let mut reader = std::io::BufReader::new(stdin.lock());
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = std::io::BufRead::read_line(&mut reader, &mut line)?;
        if bytes_read == 0 {
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let request: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(e) => {
                write_response(
                    &stdout,
                    json!(null),
                    Some(json!({"code": -32700, "message": format!("Parse error: {e}")})),
                    None,
                )?;
                continue;
            }
        };

        let id = request.get("id").cloned().unwrap_or(json!(null));
        let method = request.get("method").and_then(|v| v.as_str()).unwrap_or("");
        let is_notification = request.get("id").is_none();

        match method {
            "initialize" => {
                write_response(
                    &stdout,
                    id,
                    None,
                    Some(json!({
                        "protocolVersion": "2025-06-18",
                        "capabilities": { "tools": {} },
                        "serverInfo": { "name": "skynet", "version": env!("CARGO_PKG_VERSION") }
                    })),
                )?;
            }

            "notifications/initialized" => {}

            "tools/list" => {
                write_response(&stdout, id, None, Some(json!({ "tools": tool_definitions() })))?;
            }

            "tools/call" => {
                let params = request.get("params").cloned().unwrap_or(json!({}));
                let tool_name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
                let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

                match execute_tool(&memory, tool_name, &arguments) {
                    Ok(content) => {
                        write_response(
                            &stdout,
                            id,
                            None,
                            Some(json!({"content": [{"type": "text", "text": content}], "isError": false})),
                        )?;
                    }
                    Err(err_msg) => {
                        write_response(
                            &stdout,
                            id,
                            None,
                            Some(json!({"content": [{"type": "text", "text": err_msg}], "isError": true})),
                        )?;
                    }
                }
            }

            _ => {
                if !is_notification {
                    write_response(
                        &stdout,
                        id,
                        Some(json!({"code": -32601, "message": format!("Method not found: {method}")})),
                        None,
                    )?;
                }
            }
        }
    }

    Ok(())
}

fn write_response(stdout: &std::io::Stdout, id: Value, error: Option<Value>, result: Option<Value>) -> std::io::Result<()> {
    use std::io::Write;

    let response = if let Some(err) = error {
        json!({"jsonrpc": "2.0", "id": id, "error": err})
    } else {
        json!({"jsonrpc": "2.0", "id": id, "result": result.unwrap_or(json!(null))})
    };

    let mut out = stdout.lock();
    serde_json::to_writer(&mut out, &response)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

fn tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": "memory_learn",
            "description": "Store a fact, preference, instruction or piece of context about the principal. Overwrites an existing entry with the same key.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "category": {
                        "type": "string",
                        "enum": ["instruction", "preference", "fact", "context"],
                        "default": "fact"
                    },
                    "key": {"type": "string", "description": "short label, e.g. 'preferred_language'"},
                    "content": {"type": "string", "description": "the actual content to remember"}
                },
                "required": ["key", "content"]
            }
        }),
        json!({
            "name": "memory_forget",
            "description": "Delete a stored memory by category and key.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "category": {"type": "string", "enum": ["instruction", "preference", "fact", "context"], "default": "fact"},
                    "key": {"type": "string"}
                },
                "required": ["key"]
            }
        }),
        json!({
            "name": "memory_get",
            "description": "Fetch one stored memory by category and key.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "category": {"type": "string", "enum": ["instruction", "preference", "fact", "context"], "default": "fact"},
                    "key": {"type": "string"}
                },
                "required": ["key"]
            }
        }),
        json!({
            "name": "memory_list",
            "description": "List stored memories about the principal, most recent first.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "limit": {"type": "integer", "default": 20}
                }
            }
        }),
    ]
}

fn execute_tool(memory: &MemoryManager, tool_name: &str, args: &Value) -> Result<String, String> {
    match tool_name {
        "memory_learn" => {
            let category = parse_category(args)?;
            let key = args.get("key").and_then(|v| v.as_str()).ok_or("missing required parameter: key")?;
            let content = args.get("content").and_then(|v| v.as_str()).ok_or("missing required parameter: content")?;

            memory.learn(None, category, key, content, None).map_err(|e| format!("memory learn failed: {e}"))?;
            Ok(format!("Learned [{category}] {key} = {content}"))
        }

        "memory_forget" => {
            let category = parse_category(args)?;
            let key = args.get("key").and_then(|v| v.as_str()).ok_or("missing required parameter: key")?;

            memory.forget(None, category, key).map_err(|e| format!("memory forget failed: {e}"))?;
            Ok(format!("Forgot [{category}] {key}"))
        }

        "memory_get" => {
            let category = parse_category(args)?;
            let key = args.get("key").and_then(|v| v.as_str()).ok_or("missing required parameter: key")?;

            match memory.get_memory(None, category, key).map_err(|e| format!("memory get failed: {e}"))? {
                Some(mem) => Ok(format!("[{}] {} = {}", mem.category, mem.key, mem.content)),
                None => Ok(format!("No memory found for [{category}] {key}")),
            }
        }

        "memory_list" => {
            let limit = args.get("limit").and_then(|v| v.as_u64()).unwrap_or(20) as usize;
            let memories = memory.list_memories(None, limit).map_err(|e| format!("memory list failed: {e}"))?;

            if memories.is_empty() {
                return Ok("No memories stored yet.".to_string());
            }
            let mut out = String::new();
            for mem in &memories {
                out.push_str(&format!("- [{}] {} = {}\n", mem.category, mem.key, mem.content));
            }
            Ok(out)
        }

        _ => Err(format!("Unknown tool: {tool_name}")),
    }
}

fn parse_category(args: &Value) -> Result<MemoryCategory, String> {
    args.get("category")
        .and_then(|v| v.as_str())
        .unwrap_or("fact")
        .parse()
        .map_err(|e: String| format!("invalid category: {e}"))
}
