//! The Turn Engine: one user→agent→reply cycle, streaming or batched.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use skynet_memory::{MemoryManager, MessageRole};
use skynet_sessions::{Session, SessionManager};

use crate::actions;
use crate::invoker::{AgentEvent, AgentInvoker, ToolUseEvent, TurnRequest, TurnResult, TurnUsage};
use crate::tool_status;
use crate::transport::{MessageHandle, Transport};

const BASE_SYSTEM_PROMPT: &str = "You are Skynet, a single-user coding and operations assistant reachable over chat. \
Be direct and terse. When you want the bridge to act on your behalf (send a file, restart, remember a fact), \
emit a fenced ```megobari``` JSON block with an `action` field; otherwise just reply in plain text.";

const STATUS_EDIT_THRESHOLD: usize = 200;
const TYPING_INTERVAL: Duration = Duration::from_secs(4);

/// Per-turn accounting the caller persists to a UsageRecord-shaped store.
#[derive(Debug, Clone, Default)]
pub struct TurnUsageRecord {
    pub session_name: String,
    pub user_id: Option<String>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_usd: f64,
    pub duration_ms: u64,
    pub num_turns: u32,
}

impl TurnUsageRecord {
    fn from_usage(session_name: &str, user_id: Option<&str>, usage: &TurnUsage) -> Self {
        Self {
            session_name: session_name.to_string(),
            user_id: user_id.map(str::to_string),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cost_usd: usage.cost_usd,
            duration_ms: usage.duration_ms,
            num_turns: usage.num_turns,
        }
    }
}

/// Dependencies the Turn Engine needs beyond its explicit parameters.
/// Defined here (rather than in a channel crate) so `skynet-agent` stays
/// independent of any concrete channel host — the same separation the
/// pre-rewrite `MessageContext` trait established for this crate.
pub trait TurnContext: Send + Sync {
    fn invoker(&self) -> &AgentInvoker;
    fn memory(&self) -> &MemoryManager;
    fn sessions(&self) -> &SessionManager;
    /// Fire-and-forget usage accounting. Implementations should not block
    /// the turn on storage errors.
    fn record_usage(&self, record: TurnUsageRecord);
    /// Schedule a background summarization check for this session, if the
    /// unsummarized backlog has crossed the threshold.
    fn maybe_summarize(&self, session_name: &str);
}

/// Process-wide set of session names currently executing a turn. Every exit
/// path of `process_turn` — including the early "already busy" bail-out —
/// leaves membership consistent (finally semantics).
#[derive(Default)]
pub struct BusySet(DashSet<String>);

impl BusySet {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_acquire(&self, name: &str) -> bool {
        self.0.insert(name.to_string())
    }

    fn release(&self, name: &str) {
        self.0.remove(name);
    }
}

/// Run one full user→agent→reply cycle for `session`.
pub async fn process_turn<C: TurnContext>(
    ctx: &C,
    busy: &BusySet,
    session: &Session,
    chat_id: i64,
    message_id: i64,
    user_text: &str,
    user_id: Option<&str>,
    transport: Arc<dyn Transport>,
) {
    if !busy.try_acquire(&session.name) {
        let _ = transport.reply(chat_id, "session busy, switch or wait").await;
        return;
    }

    let _ = transport.react(chat_id, message_id, Some("\u{231B}")).await;

    let typing_cancel = CancellationToken::new();
    let typing_task = tokio::spawn(typing_loop(transport.clone(), chat_id, typing_cancel.clone()));

    run_turn_inner(ctx, session, chat_id, user_text, user_id, transport.as_ref()).await;

    typing_cancel.cancel();
    let _ = typing_task.await;
    let _ = transport.react(chat_id, message_id, None).await;
    busy.release(&session.name);
}

/// Re-assert the "typing…" indicator every ~4s until cancelled.
async fn typing_loop(transport: Arc<dyn Transport>, chat_id: i64, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(TYPING_INTERVAL) => {
                let _ = transport.typing(chat_id).await;
            }
        }
    }
}

async fn run_turn_inner<C: TurnContext>(ctx: &C, session: &Session, chat_id: i64, user_text: &str, user_id: Option<&str>, transport: &dyn Transport) {
    let recall = ctx.memory().build_recall_context(&session.name, user_id);
    let system_prompt = build_system_prompt(session, recall.context.as_deref());

    let mut resume = session.agent_thread_id.clone();
    let mut attempt = 0;
    let outcome = loop {
        attempt += 1;
        match run_one_attempt(ctx, session, &system_prompt, user_text, resume.as_deref(), chat_id, transport).await {
            Ok(outcome) => break Some(outcome),
            Err(e) if attempt == 1 && resume.is_some() => {
                warn!(session = %session.name, "turn failed with resumption, retrying fresh: {e}");
                resume = None;
                continue;
            }
            Err(e) => {
                let _ = transport.reply(chat_id, &format!("Agent error: {e}")).await;
                break None;
            }
        }
    };

    let Some(mut outcome) = outcome else { return };

    let (cleaned_text, parsed_actions) = actions::parse_actions(&outcome.text);
    if !parsed_actions.is_empty() {
        let errors = actions::execute_actions(&parsed_actions, transport, ctx.memory(), chat_id).await;
        for err in &errors {
            let _ = transport.reply(chat_id, &format!("\u{26A0}\u{FE0F} {err}")).await;
        }
        outcome.text = cleaned_text;
    }

    deliver_final_text(transport, chat_id, &outcome).await;

    if !outcome.tool_uses.is_empty() {
        let summary = tool_status::tool_summary(&outcome.tool_uses);
        if !summary.is_empty() {
            send_split(transport, chat_id, &summary).await;
        }
    }

    if let Some(thread_id) = &outcome.thread_id {
        if let Err(e) = ctx.sessions().set_agent_thread(&session.name, thread_id) {
            warn!(session = %session.name, "failed to persist agent_thread_id: {e}");
        }
    }

    ctx.record_usage(TurnUsageRecord::from_usage(&session.name, user_id, &outcome.usage));

    if let Err(e) = ctx.memory().log_message(&session.name, MessageRole::User, user_text, user_id) {
        warn!(session = %session.name, "failed to log user message: {e}");
    }
    if let Err(e) = ctx.memory().log_message(&session.name, MessageRole::Assistant, &outcome.text, user_id) {
        warn!(session = %session.name, "failed to log assistant message: {e}");
    }
    ctx.maybe_summarize(&session.name);
}

struct TurnOutcome {
    text: String,
    tool_uses: Vec<ToolUseEvent>,
    thread_id: Option<String>,
    usage: TurnUsage,
    placeholder: Option<MessageHandle>,
    streaming: bool,
}

async fn run_one_attempt<C: TurnContext>(
    ctx: &C,
    session: &Session,
    system_prompt: &str,
    user_text: &str,
    resume_thread_id: Option<&str>,
    chat_id: i64,
    transport: &dyn Transport,
) -> Result<TurnOutcome, String> {
    let (tx, mut rx) = mpsc::channel::<AgentEvent>(64);
    let cancel = CancellationToken::new();
    let streaming = session.streaming;

    let extra_dirs = session.extra_dirs.clone();
    let req = TurnRequest {
        model: session.model_id.as_deref(),
        system_prompt,
        prompt: user_text,
        resume_thread_id,
        permission_mode: session.permission_mode,
        cwd: &session.cwd,
        extra_dirs: &extra_dirs,
    };

    let run_fut = ctx.invoker().run_turn(&req, tx, cancel);
    tokio::pin!(run_fut);

    let mut placeholder: Option<MessageHandle> = None;
    let mut accumulated = String::new();
    let mut last_flushed_len = 0usize;
    let mut tool_uses: Vec<ToolUseEvent> = Vec::new();
    let mut terminal: Option<TurnResult> = None;
    let mut invoker_done = false;
    let mut invoker_err: Option<String> = None;

    loop {
        tokio::select! {
            res = &mut run_fut, if !invoker_done => {
                invoker_done = true;
                if let Err(e) = res {
                    invoker_err = Some(e.to_string());
                }
            }
            event = rx.recv() => {
                let Some(event) = event else { break };
                match event {
                    AgentEvent::Init { .. } => {}
                    AgentEvent::TextChunk(chunk) => {
                        accumulated.push_str(&chunk);
                        // Batched mode holds text back entirely until the final reply —
                        // only the tool-use status placeholder below is live-edited.
                        if streaming {
                            if placeholder.is_none() {
                                let sent = transport.reply(chat_id, &truncate_for_transport(&accumulated, transport.max_message_len())).await;
                                placeholder = sent.ok();
                                last_flushed_len = accumulated.len();
                            } else if accumulated.len().saturating_sub(last_flushed_len) >= STATUS_EDIT_THRESHOLD {
                                if let Some(handle) = &placeholder {
                                    let truncated = truncate_for_transport(&accumulated, transport.max_message_len());
                                    if transport.edit(chat_id, handle, &truncated).await.is_ok() {
                                        last_flushed_len = accumulated.len();
                                    }
                                }
                            }
                        }
                    }
                    AgentEvent::ToolUse(tool) => {
                        if accumulated.is_empty() {
                            let line = tool_status::status_line(&tool);
                            match &placeholder {
                                Some(handle) => {
                                    let _ = transport.edit(chat_id, handle, &line).await;
                                }
                                None => {
                                    placeholder = transport.reply(chat_id, &line).await.ok();
                                }
                            }
                        }
                        tool_uses.push(tool);
                    }
                    AgentEvent::Result(result) => {
                        terminal = Some(result);
                    }
                }
            }
        }
        if invoker_done && terminal.is_some() {
            break;
        }
    }

    if let Some(e) = invoker_err {
        return Err(e);
    }
    let Some(result) = terminal else {
        return Err("agent process ended without a result".to_string());
    };
    if result.is_error {
        return Err(result.text);
    }

    Ok(TurnOutcome {
        text: if result.text.is_empty() { accumulated } else { result.text },
        tool_uses,
        thread_id: result.thread_id,
        usage: result.usage,
        placeholder,
        streaming,
    })
}

/// Streaming mode edits the live placeholder into the final reply when it
/// still fits; batched mode always deletes whatever status placeholder is
/// showing and sends the final reply fresh.
async fn deliver_final_text(transport: &dyn Transport, chat_id: i64, outcome: &TurnOutcome) {
    let max_len = transport.max_message_len();
    let fits = outcome.text.len() <= max_len;

    match &outcome.placeholder {
        Some(handle) if outcome.streaming && fits => {
            let _ = transport.edit(chat_id, handle, &outcome.text).await;
        }
        Some(handle) => {
            let _ = transport.delete(chat_id, handle).await;
            send_split(transport, chat_id, &outcome.text).await;
        }
        None => {
            send_split(transport, chat_id, &outcome.text).await;
        }
    }
}

fn truncate_for_transport(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        text.to_string()
    } else {
        let mut end = max_len;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text[..end].to_string()
    }
}

/// Split `text` into transport-sized chunks, preferring paragraph, then
/// line, then space, then a hard cut, and send each as its own message.
async fn send_split(transport: &dyn Transport, chat_id: i64, text: &str) {
    for chunk in split_for_transport(text, transport.max_message_len()) {
        let _ = transport.reply(chat_id, &chunk).await;
    }
}

fn split_for_transport(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }
        let window = &remaining[..max_len.min(remaining.len())];
        let split_at = window
            .rfind("\n\n")
            .map(|i| i + 2)
            .or_else(|| window.rfind('\n').map(|i| i + 1))
            .or_else(|| window.rfind(' ').map(|i| i + 1))
            .filter(|&i| i > 0)
            .unwrap_or_else(|| {
                let mut end = max_len;
                while !remaining.is_char_boundary(end) {
                    end -= 1;
                }
                end
            });
        chunks.push(remaining[..split_at].to_string());
        remaining = &remaining[split_at..];
    }
    chunks
}

fn build_system_prompt(session: &Session, recall_context: Option<&str>) -> String {
    let mut prompt = BASE_SYSTEM_PROMPT.to_string();
    if !session.extra_dirs.is_empty() {
        prompt.push_str(&format!("\n\nYou also have access to these additional working directories: {}.", session.extra_dirs.join(", ")));
    }
    if let Some(context) = recall_context {
        prompt.push_str("\n\n");
        prompt.push_str(context);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_set_blocks_second_acquire() {
        let busy = BusySet::new();
        assert!(busy.try_acquire("s1"));
        assert!(!busy.try_acquire("s1"));
        busy.release("s1");
        assert!(busy.try_acquire("s1"));
    }

    #[test]
    fn split_prefers_paragraph_boundary() {
        let text = format!("{}\n\n{}", "a".repeat(50), "b".repeat(50));
        let chunks = split_for_transport(&text, 60);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn split_falls_back_to_hard_cut_on_long_word() {
        let text = "x".repeat(500);
        let chunks = split_for_transport(&text, 100);
        assert!(chunks.len() >= 5);
        assert!(chunks.iter().all(|c| c.len() <= 100));
    }

    #[test]
    fn no_split_when_under_limit() {
        let chunks = split_for_transport("short text", 100);
        assert_eq!(chunks, vec!["short text".to_string()]);
    }

    #[test]
    fn system_prompt_includes_recall_context() {
        let session = Session::new("s".to_string(), "/tmp".to_string());
        let prompt = build_system_prompt(&session, Some("## Memory\n- fact: x"));
        assert!(prompt.contains("## Memory"));
    }
}
