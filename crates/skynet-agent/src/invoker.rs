//! The Agent Invoker: a `claude` CLI subprocess bridge that yields a lazy
//! sequence of typed turn events over `--output-format stream-json`.
//!
//! Claude Code handles its own tool execution internally (Bash, Read, Write,
//! Grep, etc.) — this module never defines or executes a tool itself. It only
//! spawns the CLI, feeds it the prompt, and translates its newline-delimited
//! JSON event stream into [`AgentEvent`]s for the Turn Engine to consume.

use std::process::Stdio;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use skynet_sessions::PermissionMode;

use crate::error::{AgentError, Result};

/// A single structured tool invocation reported by the agent.
#[derive(Debug, Clone, Serialize)]
pub struct ToolUseEvent {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Token/cost accounting for one turn.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TurnUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_usd: f64,
    pub duration_ms: u64,
    pub num_turns: u32,
}

/// Final, terminal event of a turn.
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub text: String,
    pub tool_uses: Vec<ToolUseEvent>,
    pub thread_id: Option<String>,
    pub usage: TurnUsage,
    pub is_error: bool,
}

/// Typed events read off the agent's stdout, in arrival order.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// First event of a turn; carries the resumption token for this run.
    Init { thread_id: Option<String> },
    /// Incremental assistant text.
    TextChunk(String),
    /// The agent started using a tool.
    ToolUse(ToolUseEvent),
    /// Turn finished. Always the last event sent.
    Result(TurnResult),
}

/// Everything the invoker needs to start one turn.
pub struct TurnRequest<'a> {
    pub model: Option<&'a str>,
    pub system_prompt: &'a str,
    pub prompt: &'a str,
    /// `Some` requests resumption of a prior thread.
    pub resume_thread_id: Option<&'a str>,
    pub permission_mode: PermissionMode,
    pub cwd: &'a str,
    pub extra_dirs: &'a [String],
}

/// Subprocess bridge to the `claude` CLI.
pub struct AgentInvoker {
    command: String,
    mcp_bridge_path: Option<String>,
}

impl AgentInvoker {
    pub fn new(command: String) -> Self {
        Self { command, mcp_bridge_path: None }
    }

    pub fn with_mcp_bridge(mut self, path: Option<String>) -> Self {
        self.mcp_bridge_path = path;
        self
    }

    fn resolve_mcp_binary(&self) -> Option<String> {
        if let Some(path) = &self.mcp_bridge_path {
            if !path.is_empty() {
                return Some(path.clone());
            }
        }
        let home = std::env::var("HOME").ok()?;
        let installed = std::path::Path::new(&home).join(".skynet/skynet-gateway");
        installed.exists().then(|| installed.to_string_lossy().to_string())
    }

    fn write_mcp_config(&self, cmd: &mut tokio::process::Command) -> Option<tempfile::NamedTempFile> {
        let binary = self.resolve_mcp_binary()?;
        let config = serde_json::json!({
            "mcpServers": { "skynet": { "type": "stdio", "command": binary, "args": ["mcp-bridge"] } }
        });
        let file = tempfile::Builder::new().prefix("skynet-mcp-").suffix(".json").tempfile().ok()?;
        std::fs::write(file.path(), serde_json::to_string(&config).ok()?).ok()?;
        cmd.arg("--mcp-config").arg(file.path());
        Some(file)
    }

    /// Run one turn, streaming [`AgentEvent`]s to `tx` as they arrive off
    /// stdout. Resolves once the process exits (successfully or not); the
    /// final `Result` event, if any, always precedes resolution.
    ///
    /// `cancel` propagates to the child as SIGTERM when triggered.
    pub async fn run_turn(&self, req: &TurnRequest<'_>, tx: mpsc::Sender<AgentEvent>, cancel: CancellationToken) -> Result<()> {
        let sys_file = tempfile::Builder::new()
            .prefix("skynet-sys-")
            .suffix(".txt")
            .tempfile()
            .map_err(|e| AgentError::Process(format!("failed to create temp file: {e}")))?;
        std::fs::write(sys_file.path(), req.system_prompt)
            .map_err(|e| AgentError::Process(format!("failed to write system prompt: {e}")))?;

        let mut cmd = tokio::process::Command::new(&self.command);
        cmd.arg("-p")
            .arg("--output-format")
            .arg("stream-json")
            .arg("--input-format")
            .arg("text")
            .arg("--verbose")
            .arg("--system-prompt-file")
            .arg(sys_file.path())
            .arg("--add-dir")
            .args(req.extra_dirs)
            .current_dir(req.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(model) = req.model {
            cmd.arg("--model").arg(model);
        }

        match req.permission_mode {
            PermissionMode::BypassPermissions => {
                cmd.arg("--dangerously-skip-permissions");
            }
            PermissionMode::AcceptEdits => {
                cmd.arg("--permission-mode").arg("acceptEdits");
            }
            PermissionMode::Default => {}
        }

        if let Some(thread_id) = req.resume_thread_id {
            cmd.arg("--resume").arg(thread_id);
        }

        let _mcp_file = self.write_mcp_config(&mut cmd);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AgentError::Process(format!("claude CLI not found at '{}' — install Claude Code first", self.command))
            } else {
                AgentError::Process(format!("failed to spawn claude CLI: {e}"))
            }
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(req.prompt.as_bytes())
                .await
                .map_err(|e| AgentError::Process(format!("failed to write to claude stdin: {e}")))?;
        }

        let stdout = child.stdout.take().expect("piped stdout");
        let mut lines = BufReader::new(stdout).lines();

        let mut terminal_result: Option<TurnResult> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = child.start_kill();
                    break;
                }
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if line.trim().is_empty() {
                                continue;
                            }
                            match parse_event_line(&line) {
                                Ok(Some(event)) => {
                                    if let AgentEvent::Result(ref result) = event {
                                        terminal_result = Some(result.clone());
                                    }
                                    if tx.send(event).await.is_err() {
                                        let _ = child.start_kill();
                                        break;
                                    }
                                }
                                Ok(None) => {} // recognized-but-ignored event type
                                Err(e) => debug!(%e, line = %truncate(&line, 200), "skipping unparseable stream-json line"),
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!("error reading claude CLI stdout: {e}");
                            break;
                        }
                    }
                }
            }
        }

        let status = child.wait().await.map_err(|e| AgentError::Process(format!("claude CLI process error: {e}")))?;

        if terminal_result.is_none() && !status.success() {
            return Err(AgentError::Process(format!("claude CLI exited with status {status}")));
        }

        Ok(())
    }
}

/// Translate one `stream-json` NDJSON line into an [`AgentEvent`].
/// `Ok(None)` means the line was a recognized but uninteresting event type
/// (e.g. a tool_result echoed back to the user role); unknown event types
/// degrade to `Ok(None)` rather than aborting the turn.
fn parse_event_line(line: &str) -> std::result::Result<Option<AgentEvent>, String> {
    let value: serde_json::Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
    let event_type = value.get("type").and_then(|v| v.as_str()).unwrap_or("");

    match event_type {
        "system" => {
            let subtype = value.get("subtype").and_then(|v| v.as_str()).unwrap_or("");
            if subtype != "init" {
                return Ok(None);
            }
            let thread_id = value.get("session_id").and_then(|v| v.as_str()).map(str::to_string);
            Ok(Some(AgentEvent::Init { thread_id }))
        }
        "assistant" => {
            let Some(content) = value.pointer("/message/content").and_then(|v| v.as_array()) else {
                return Ok(None);
            };
            // A single assistant event can carry several content blocks; the
            // caller sees them as separate events in the same arrival order.
            // Only the first is returned here — callers that need the rest
            // should use `parse_event_blocks` instead. In practice Claude
            // Code emits one text OR one tool_use block per assistant event.
            for block in content {
                match block.get("type").and_then(|v| v.as_str()) {
                    Some("text") => {
                        let text = block.get("text").and_then(|v| v.as_str()).unwrap_or("");
                        if !text.is_empty() {
                            return Ok(Some(AgentEvent::TextChunk(text.to_string())));
                        }
                    }
                    Some("tool_use") => {
                        let id = block.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                        let name = block.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                        let input = block.get("input").cloned().unwrap_or(serde_json::Value::Null);
                        return Ok(Some(AgentEvent::ToolUse(ToolUseEvent { id, name, input })));
                    }
                    _ => {}
                }
            }
            Ok(None)
        }
        "result" => {
            let text = value.get("result").and_then(|v| v.as_str()).unwrap_or("").to_string();
            let is_error = value.get("is_error").and_then(|v| v.as_bool()).unwrap_or(false);
            let thread_id = value.get("session_id").and_then(|v| v.as_str()).map(str::to_string);
            let usage = TurnUsage {
                input_tokens: value.pointer("/usage/input_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                output_tokens: value.pointer("/usage/output_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                cost_usd: value.get("total_cost_usd").and_then(|v| v.as_f64()).unwrap_or(0.0),
                duration_ms: value.get("duration_ms").and_then(|v| v.as_u64()).unwrap_or(0),
                num_turns: value.get("num_turns").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
            };
            Ok(Some(AgentEvent::Result(TurnResult { text, tool_uses: Vec::new(), thread_id, usage, is_error })))
        }
        _ => Ok(None),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        s
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_init_event() {
        let line = r#"{"type":"system","subtype":"init","session_id":"abc123"}"#;
        let event = parse_event_line(line).unwrap().unwrap();
        assert!(matches!(event, AgentEvent::Init { thread_id: Some(id) } if id == "abc123"));
    }

    #[test]
    fn parses_text_chunk() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hello"}]}}"#;
        let event = parse_event_line(line).unwrap().unwrap();
        assert!(matches!(event, AgentEvent::TextChunk(t) if t == "hello"));
    }

    #[test]
    fn parses_tool_use() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"Bash","input":{"command":"ls"}}]}}"#;
        let event = parse_event_line(line).unwrap().unwrap();
        match event {
            AgentEvent::ToolUse(tu) => {
                assert_eq!(tu.name, "Bash");
                assert_eq!(tu.id, "t1");
            }
            _ => panic!("expected ToolUse"),
        }
    }

    #[test]
    fn parses_result_with_usage() {
        let line = r#"{"type":"result","result":"done","is_error":false,"session_id":"abc","usage":{"input_tokens":10,"output_tokens":20},"total_cost_usd":0.01,"duration_ms":500,"num_turns":3}"#;
        let event = parse_event_line(line).unwrap().unwrap();
        match event {
            AgentEvent::Result(r) => {
                assert_eq!(r.text, "done");
                assert_eq!(r.usage.input_tokens, 10);
                assert_eq!(r.thread_id.as_deref(), Some("abc"));
            }
            _ => panic!("expected Result"),
        }
    }

    #[test]
    fn unknown_event_type_degrades_to_none() {
        let line = r#"{"type":"something_new","data":{}}"#;
        assert!(parse_event_line(line).unwrap().is_none());
    }

    #[test]
    fn malformed_json_is_an_error_not_a_panic() {
        assert!(parse_event_line("not json").is_err());
    }
}
