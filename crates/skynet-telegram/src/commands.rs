//! Slash-command dispatch.
//!
//! Every command that doesn't need to hold a turn slot or stream a reply is
//! handled here and answered with a single text reply. Commands that send a
//! local file go straight through the `Transport` they're given; everything
//! else that falls through (plain text, or an unrecognized `/foo`) is left
//! for the caller to route to the Turn Engine.

use skynet_agent::transport::Transport;
use skynet_memory::{MemoryCategory, MessageRole};
use skynet_monitor::{ChannelType, EntityType, ResourceType};
use skynet_sessions::{PermissionMode, Session, ThinkingMode};

use crate::context::BridgeContext;

/// Dispatch `text` as a slash command. Returns `None` if `text` isn't a
/// recognized command — the caller should then treat it as a normal prompt.
pub async fn dispatch<C: BridgeContext>(
    ctx: &C,
    transport: &dyn Transport,
    chat_id: i64,
    session: &Session,
    text: &str,
) -> Option<String> {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return None;
    }
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("").trim_start_matches('/').to_ascii_lowercase();
    let rest = parts.next().unwrap_or("").trim();

    let reply = match cmd.as_str() {
        // -- session management ------------------------------------------
        "start" => cmd_start(ctx, session),
        "new" => cmd_new(ctx, rest),
        "sessions" => cmd_sessions(ctx),
        "switch" => cmd_switch(ctx, rest),
        "delete" => cmd_delete(ctx, rest),
        "rename" => cmd_rename(ctx, rest),
        "stream" => cmd_stream(ctx, session, rest),
        "permissions" => cmd_permissions(ctx, session, rest),

        // -- workspace ------------------------------------------------------
        "cd" => cmd_cd(ctx, session, rest),
        "dirs" => cmd_dirs(ctx, session, rest),
        "file" => return cmd_file(ctx, transport, chat_id, session, rest).await,

        // -- tuning ---------------------------------------------------------
        "think" => cmd_think(ctx, session, rest),
        "effort" => cmd_effort(ctx, session, rest),
        "model" => cmd_model(ctx, session, rest),
        "autonomous" => cmd_autonomous(ctx, session, rest),

        // -- persona / memory -------------------------------------------------
        "persona" => cmd_persona(ctx, rest),
        "mcp" => cmd_mcp(ctx, rest),
        "skills" => cmd_skills(ctx, rest),
        "memory" => cmd_memory(ctx, rest),
        "summaries" => cmd_summaries(ctx, session, rest),

        // -- usage / context --------------------------------------------------
        "usage" => cmd_usage(ctx, session, rest),
        "compact" => cmd_compact(ctx, session),
        "context" => cmd_context(ctx, session),
        "history" => cmd_history(ctx, session, rest),

        // -- scheduling / monitoring / ops --------------------------------
        "cron" => cmd_cron(ctx, session, rest),
        "heartbeat" => cmd_heartbeat(ctx, rest),
        "monitor" => cmd_monitor(ctx, rest),

        // -- admin ------------------------------------------------------------
        "help" => cmd_help(),
        "current" => cmd_current(session),
        "restart" => return Some(cmd_restart(ctx, transport, chat_id).await),
        "release" => cmd_release(session, rest),
        "doctor" => cmd_doctor(ctx),

        _ => return None,
    };

    Some(reply)
}

// ---------------------------------------------------------------------
// Session management
// ---------------------------------------------------------------------

fn cmd_start<C: BridgeContext>(ctx: &C, session: &Session) -> String {
    let _ = ctx;
    format!(
        "Hi — already talking in session `{}`. Use /new to start fresh, or /sessions to see them all.",
        session.name
    )
}

fn cmd_new<C: BridgeContext>(ctx: &C, name: &str) -> String {
    if name.is_empty() {
        return "Usage: /new <name>".to_string();
    }
    let cwd = ctx
        .sessions()
        .current()
        .map(|s| s.cwd)
        .unwrap_or_else(|| std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()));
    match ctx.sessions().create(name, cwd) {
        Ok(s) => format!("Created and switched to session `{}`.", s.name),
        Err(e) => format!("Failed to create session: {e}"),
    }
}

fn cmd_sessions<C: BridgeContext>(ctx: &C) -> String {
    let all = ctx.sessions().list_all();
    if all.is_empty() {
        return "No sessions yet. Use /new <name>.".to_string();
    }
    let active = ctx.sessions().active_name();
    let mut lines = vec!["Sessions:".to_string()];
    for s in all {
        let marker = if Some(&s.name) == active.as_ref() { "* " } else { "  " };
        lines.push(format!("{marker}{} — {}", s.name, s.cwd));
    }
    lines.join("\n")
}

fn cmd_switch<C: BridgeContext>(ctx: &C, name: &str) -> String {
    if name.is_empty() {
        return "Usage: /switch <name>".to_string();
    }
    match ctx.sessions().switch(name) {
        Ok(()) => format!("Switched to session `{name}`."),
        Err(e) => format!("Failed to switch: {e}"),
    }
}

fn cmd_delete<C: BridgeContext>(ctx: &C, name: &str) -> String {
    if name.is_empty() {
        return "Usage: /delete <name>".to_string();
    }
    match ctx.sessions().delete(name) {
        Ok(true) => format!("Deleted session `{name}`."),
        Ok(false) => format!("No such session: `{name}`."),
        Err(e) => format!("Failed to delete: {e}"),
    }
}

fn cmd_rename<C: BridgeContext>(ctx: &C, rest: &str) -> String {
    let mut args = rest.split_whitespace();
    let (Some(old), Some(new)) = (args.next(), args.next()) else {
        return "Usage: /rename <old> <new>".to_string();
    };
    match ctx.sessions().rename(old, new) {
        Ok(()) => format!("Renamed `{old}` to `{new}`."),
        Err(e) => format!("Failed to rename: {e}"),
    }
}

fn cmd_stream<C: BridgeContext>(ctx: &C, session: &Session, rest: &str) -> String {
    let on = match rest.to_ascii_lowercase().as_str() {
        "on" => true,
        "off" => false,
        _ => return "Usage: /stream on|off".to_string(),
    };
    match ctx.sessions().update(&session.name, |s| s.streaming = on) {
        Ok(_) => format!("Streaming {}.", if on { "enabled" } else { "disabled" }),
        Err(e) => format!("Failed: {e}"),
    }
}

fn cmd_permissions<C: BridgeContext>(ctx: &C, session: &Session, rest: &str) -> String {
    let mode = match rest.to_ascii_lowercase().as_str() {
        "default" => PermissionMode::Default,
        "accept_edits" | "acceptedits" => PermissionMode::AcceptEdits,
        "bypass" | "bypasspermissions" => PermissionMode::BypassPermissions,
        _ => return "Usage: /permissions default|accept_edits|bypass".to_string(),
    };
    match ctx.sessions().update(&session.name, |s| s.permission_mode = mode) {
        Ok(s) => format!("Permission mode set to {:?}.", s.permission_mode),
        Err(e) => format!("Failed: {e}"),
    }
}

// ---------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------

fn cmd_cd<C: BridgeContext>(ctx: &C, session: &Session, path: &str) -> String {
    if path.is_empty() {
        return format!("Current working directory: `{}`", session.cwd);
    }
    let expanded = shellexpand_tilde(path);
    if !std::path::Path::new(&expanded).is_dir() {
        return format!("Not a directory: `{expanded}`");
    }
    match ctx.sessions().update(&session.name, |s| s.cwd = expanded.clone()) {
        Ok(_) => format!("Working directory set to `{expanded}`."),
        Err(e) => format!("Failed: {e}"),
    }
}

fn cmd_dirs<C: BridgeContext>(ctx: &C, session: &Session, rest: &str) -> String {
    let mut args = rest.splitn(2, char::is_whitespace);
    match args.next().unwrap_or("") {
        "add" => {
            let dir = shellexpand_tilde(args.next().unwrap_or("").trim());
            if dir.is_empty() {
                return "Usage: /dirs add <path>".to_string();
            }
            if !std::path::Path::new(&dir).is_dir() {
                return format!("Not a directory: `{dir}`");
            }
            match ctx.sessions().update(&session.name, |s| {
                if !s.extra_dirs.contains(&dir) {
                    s.extra_dirs.push(dir.clone());
                }
            }) {
                Ok(s) => format!("Extra dirs: {}", s.extra_dirs.join(", ")),
                Err(e) => format!("Failed: {e}"),
            }
        }
        "rm" => {
            let dir = args.next().unwrap_or("").trim().to_string();
            match ctx.sessions().update(&session.name, |s| s.extra_dirs.retain(|d| d != &dir)) {
                Ok(s) => format!("Extra dirs: {}", s.extra_dirs.join(", ")),
                Err(e) => format!("Failed: {e}"),
            }
        }
        _ => {
            if session.extra_dirs.is_empty() {
                "No extra directories. Use /dirs add <path>.".to_string()
            } else {
                format!("Extra dirs: {}", session.extra_dirs.join(", "))
            }
        }
    }
}

async fn cmd_file<C: BridgeContext>(
    ctx: &C,
    transport: &dyn Transport,
    chat_id: i64,
    session: &Session,
    rest: &str,
) -> Option<String> {
    let _ = ctx;
    if rest.is_empty() {
        return Some("Usage: /file <path>".to_string());
    }
    let expanded = shellexpand_tilde(rest);
    let path = if std::path::Path::new(&expanded).is_absolute() {
        std::path::PathBuf::from(&expanded)
    } else {
        std::path::Path::new(&session.cwd).join(&expanded)
    };
    if !path.is_file() {
        return Some(format!("File not found: `{}`", path.display()));
    }
    match transport.send_file(chat_id, &path, None).await {
        Ok(()) => None,
        Err(e) => Some(format!("Failed to send file: {e}")),
    }
}

/// Split off up to `n` leading whitespace-separated words from `s`, returning
/// them alongside whatever (whitespace-trimmed) text follows — used where a
/// command's trailing argument is free text that must keep its own spacing
/// (a prompt, a cron expression's sibling args).
fn take_words(s: &str, n: usize) -> (Vec<&str>, &str) {
    let mut rest = s;
    let mut words = Vec::with_capacity(n);
    for _ in 0..n {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        words.push(&rest[..end]);
        rest = &rest[end..];
    }
    (words, rest.trim_start())
}

fn shellexpand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{home}/{rest}");
        }
    }
    path.to_string()
}

// ---------------------------------------------------------------------
// Tuning
// ---------------------------------------------------------------------

fn cmd_think<C: BridgeContext>(ctx: &C, session: &Session, rest: &str) -> String {
    let lower = rest.to_ascii_lowercase();
    let (mode, budget) = match lower.as_str() {
        "off" | "disabled" => (ThinkingMode::Disabled, None),
        "adaptive" => (ThinkingMode::Adaptive, None),
        "" | "on" | "enabled" => (ThinkingMode::Enabled, None),
        other => match other.parse::<u32>() {
            Ok(tokens) => (ThinkingMode::Enabled, Some(tokens)),
            Err(_) => return "Usage: /think off|adaptive|on|<budget tokens>".to_string(),
        },
    };
    match ctx.sessions().update(&session.name, |s| {
        s.thinking_mode = mode;
        s.thinking_budget_tokens = budget;
    }) {
        Ok(s) => format!("Thinking mode: {:?}{}", s.thinking_mode, budget.map(|b| format!(" ({b} tokens)")).unwrap_or_default()),
        Err(e) => format!("Failed: {e}"),
    }
}

fn cmd_effort<C: BridgeContext>(ctx: &C, session: &Session, rest: &str) -> String {
    use skynet_sessions::EffortLevel;
    let level = match rest.to_ascii_lowercase().as_str() {
        "low" => Some(EffortLevel::Low),
        "medium" => Some(EffortLevel::Medium),
        "high" => Some(EffortLevel::High),
        "max" => Some(EffortLevel::Max),
        "off" | "default" => None,
        _ => return "Usage: /effort low|medium|high|max|off".to_string(),
    };
    match ctx.sessions().update(&session.name, |s| s.effort_level = level) {
        Ok(s) => format!("Effort level: {:?}", s.effort_level),
        Err(e) => format!("Failed: {e}"),
    }
}

/// Short names the agent CLI accepts in place of a full model identifier.
fn resolve_model_alias(name: &str) -> &str {
    match name.to_ascii_lowercase().as_str() {
        "opus" => "claude-opus-4-6",
        "sonnet" => "claude-sonnet-4-6",
        "haiku" => "claude-haiku-4-6",
        _ => name,
    }
}

fn cmd_model<C: BridgeContext>(ctx: &C, session: &Session, rest: &str) -> String {
    if rest.is_empty() {
        return format!("Current model: {}", session.model_id.as_deref().unwrap_or("(default)"));
    }
    let model_id = if rest.eq_ignore_ascii_case("default") {
        None
    } else {
        Some(resolve_model_alias(rest).to_string())
    };
    match ctx.sessions().update(&session.name, |s| s.model_id = model_id.clone()) {
        Ok(s) => format!("Model set to {}.", s.model_id.as_deref().unwrap_or("(default)")),
        Err(e) => format!("Failed: {e}"),
    }
}

const DEFAULT_AUTONOMOUS_MAX_TURNS: u32 = 50;

fn cmd_autonomous<C: BridgeContext>(ctx: &C, session: &Session, rest: &str) -> String {
    let mut args = rest.splitn(2, char::is_whitespace);
    match args.next().unwrap_or("").to_ascii_lowercase().as_str() {
        "on" => match ctx.sessions().update(&session.name, |s| s.max_turns = Some(DEFAULT_AUTONOMOUS_MAX_TURNS)) {
            Ok(_) => format!("Autonomous mode on ({DEFAULT_AUTONOMOUS_MAX_TURNS} turns)."),
            Err(e) => format!("Failed: {e}"),
        },
        "off" => match ctx.sessions().update(&session.name, |s| s.max_turns = None) {
            Ok(_) => "Autonomous mode off.".to_string(),
            Err(e) => format!("Failed: {e}"),
        },
        "turns" => {
            let Some(n) = args.next().and_then(|n| n.trim().parse::<u32>().ok()) else {
                return "Usage: /autonomous turns <N>".to_string();
            };
            match ctx.sessions().update(&session.name, |s| s.max_turns = Some(n)) {
                Ok(_) => format!("Autonomous max turns set to {n}."),
                Err(e) => format!("Failed: {e}"),
            }
        }
        "budget" => {
            let arg = args.next().unwrap_or("").trim();
            if arg.eq_ignore_ascii_case("off") {
                return match ctx.sessions().update(&session.name, |s| s.max_budget_usd = None) {
                    Ok(_) => "Autonomous budget cleared.".to_string(),
                    Err(e) => format!("Failed: {e}"),
                };
            }
            let Some(usd) = arg.trim_start_matches('$').parse::<f64>().ok() else {
                return "Usage: /autonomous budget $<amount>|off".to_string();
            };
            match ctx.sessions().update(&session.name, |s| s.max_budget_usd = Some(usd)) {
                Ok(_) => format!("Autonomous budget set to ${usd:.2}."),
                Err(e) => format!("Failed: {e}"),
            }
        }
        _ => "Usage: /autonomous on|off|turns <N>|budget $<amount>|off".to_string(),
    }
}

// ---------------------------------------------------------------------
// Persona / memory
// ---------------------------------------------------------------------

fn cmd_persona<C: BridgeContext>(ctx: &C, rest: &str) -> String {
    let mut args = rest.splitn(2, char::is_whitespace);
    match args.next().unwrap_or("") {
        "list" | "" => {
            let personas = ctx.memory().list_personas().unwrap_or_default();
            if personas.is_empty() {
                return "No personas yet. Use /persona create <name>.".to_string();
            }
            let default = ctx.memory().default_persona().ok().flatten().map(|p| p.name);
            personas
                .iter()
                .map(|p| {
                    let marker = if Some(&p.name) == default.as_ref() { "* " } else { "  " };
                    format!("{marker}{}", p.name)
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        "create" => {
            let name = args.next().unwrap_or("").trim();
            if name.is_empty() {
                return "Usage: /persona create <name>".to_string();
            }
            match ctx.memory().create_persona(name, None, None, &[], &[], None) {
                Ok(p) => format!("Created persona `{}`.", p.name),
                Err(e) => format!("Failed: {e}"),
            }
        }
        "info" => {
            let name = args.next().unwrap_or("").trim();
            match ctx.memory().get_persona(name) {
                Ok(Some(p)) => format!(
                    "Persona `{}`\nDescription: {}\nMCP servers: {}\nSkills: {}",
                    p.name,
                    p.description.as_deref().unwrap_or("(none)"),
                    p.mcp_servers.join(", "),
                    p.skills.join(", ")
                ),
                Ok(None) => format!("No such persona: `{name}`"),
                Err(e) => format!("Failed: {e}"),
            }
        }
        "default" => {
            let name = args.next().unwrap_or("").trim();
            if name.is_empty() {
                return "Usage: /persona default <name>".to_string();
            }
            match ctx.memory().set_default_persona(name) {
                Ok(()) => format!("`{name}` is now the default persona."),
                Err(e) => format!("Failed: {e}"),
            }
        }
        "delete" => {
            let name = args.next().unwrap_or("").trim();
            match ctx.memory().delete_persona(name) {
                Ok(()) => format!("Deleted persona `{name}`."),
                Err(e) => format!("Failed: {e}"),
            }
        }
        "prompt" => {
            let rest = args.next().unwrap_or("");
            let mut inner = rest.splitn(2, char::is_whitespace);
            let (Some(name), Some(prompt)) = (inner.next(), inner.next()) else {
                return "Usage: /persona prompt <name> <text>".to_string();
            };
            match ctx.memory().update_persona_prompt(name, prompt) {
                Ok(()) => format!("Updated prompt for `{name}`."),
                Err(e) => format!("Failed: {e}"),
            }
        }
        other => format!("Unknown /persona subcommand: `{other}`"),
    }
}

fn cmd_mcp<C: BridgeContext>(ctx: &C, rest: &str) -> String {
    let mut args = rest.splitn(2, char::is_whitespace);
    let (Some(name), Some(servers)) = (args.next(), args.next()) else {
        return "Usage: /mcp <persona> <server1,server2,...>".to_string();
    };
    let list: Vec<String> = servers.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    match ctx.memory().update_persona_mcp_servers(name, &list) {
        Ok(()) => format!("MCP servers for `{name}`: {}", list.join(", ")),
        Err(e) => format!("Failed: {e}"),
    }
}

fn cmd_skills<C: BridgeContext>(ctx: &C, rest: &str) -> String {
    let mut args = rest.splitn(2, char::is_whitespace);
    let (Some(name), Some(skills)) = (args.next(), args.next()) else {
        return "Usage: /skills <persona> <skill1,skill2,...>".to_string();
    };
    let list: Vec<String> = skills.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    match ctx.memory().update_persona_skills(name, &list) {
        Ok(()) => format!("Skills for `{name}`: {}", list.join(", ")),
        Err(e) => format!("Failed: {e}"),
    }
}

fn cmd_memory<C: BridgeContext>(ctx: &C, rest: &str) -> String {
    let mut args = rest.splitn(3, char::is_whitespace);
    match args.next().unwrap_or("") {
        "list" => {
            let memories = ctx.memory().list_memories(None, 50).unwrap_or_default();
            if memories.is_empty() {
                return "No memories stored.".to_string();
            }
            memories.iter().map(|m| format!("[{}] {} = {}", m.category, m.key, m.content)).collect::<Vec<_>>().join("\n")
        }
        "get" => {
            let Some((category, key)) = parse_category_key(args.next(), args.next()) else {
                return "Usage: /memory get <category> <key>".to_string();
            };
            match ctx.memory().get_memory(None, category, &key) {
                Ok(Some(m)) => format!("{} = {}", m.key, m.content),
                Ok(None) => "Not found.".to_string(),
                Err(e) => format!("Failed: {e}"),
            }
        }
        "set" => {
            let category_raw = args.next().unwrap_or("");
            let rest2 = args.next().unwrap_or("");
            let mut inner = rest2.splitn(2, char::is_whitespace);
            let (Some(key), Some(value)) = (inner.next(), inner.next()) else {
                return "Usage: /memory set <category> <key> <value>".to_string();
            };
            let Ok(category) = category_raw.parse::<MemoryCategory>() else {
                return format!("Unknown category: `{category_raw}`");
            };
            match ctx.memory().learn(None, category, key, value, None) {
                Ok(()) => format!("Remembered {key}."),
                Err(e) => format!("Failed: {e}"),
            }
        }
        "delete" => {
            let Some((category, key)) = parse_category_key(args.next(), args.next()) else {
                return "Usage: /memory delete <category> <key>".to_string();
            };
            match ctx.memory().forget(None, category, &key) {
                Ok(()) => format!("Forgot {key}."),
                Err(e) => format!("Failed: {e}"),
            }
        }
        other => format!("Unknown /memory subcommand: `{other}`"),
    }
}

fn parse_category_key(category: Option<&str>, key: Option<&str>) -> Option<(MemoryCategory, String)> {
    let category = category?.parse::<MemoryCategory>().ok()?;
    let key = key?.to_string();
    Some((category, key))
}

fn cmd_summaries<C: BridgeContext>(ctx: &C, session: &Session, rest: &str) -> String {
    let mut args = rest.splitn(2, char::is_whitespace);
    match args.next().unwrap_or("") {
        "search" => {
            let query = args.next().unwrap_or("").trim();
            if query.is_empty() {
                return "Usage: /summaries search <query>".to_string();
            }
            let results = ctx.memory().search_summaries(query, 10).unwrap_or_default();
            format_summaries(&results)
        }
        "milestones" => {
            let results = ctx.memory().milestone_summaries(&session.name, 10).unwrap_or_default();
            format_summaries(&results)
        }
        "all" | "" => {
            let results = ctx.memory().recent_summaries(&session.name, 10).unwrap_or_default();
            format_summaries(&results)
        }
        other => format!("Unknown /summaries subcommand: `{other}`"),
    }
}

fn format_summaries(summaries: &[skynet_memory::ConversationSummary]) -> String {
    if summaries.is_empty() {
        return "No summaries found.".to_string();
    }
    summaries
        .iter()
        .map(|s| format!("[{}] {}", s.created_at, s.short_summary.as_deref().unwrap_or(&s.full_summary)))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------
// Usage / context
// ---------------------------------------------------------------------

fn cmd_usage<C: BridgeContext>(ctx: &C, session: &Session, rest: &str) -> String {
    let all = rest.trim().eq_ignore_ascii_case("all");
    match ctx.usage_summary(if all { None } else { Some(&session.name) }) {
        Ok(u) => format!(
            "Turns: {}\nInput tokens: {}\nOutput tokens: {}\nCost: ${:.4}",
            u.num_turns, u.input_tokens, u.output_tokens, u.cost_usd
        ),
        Err(e) => format!("Failed to read usage: {e}"),
    }
}

fn cmd_compact<C: BridgeContext>(ctx: &C, session: &Session) -> String {
    match ctx.memory().needs_summary(&session.name, skynet_core::config::SUMMARY_THRESHOLD) {
        Ok(true) => {
            ctx.maybe_summarize(&session.name);
            "Summarizing older history in the background.".to_string()
        }
        Ok(false) => "Nothing to compact yet.".to_string(),
        Err(e) => format!("Failed: {e}"),
    }
}

fn cmd_context<C: BridgeContext>(ctx: &C, session: &Session) -> String {
    let recent = ctx.memory().recent_messages(&session.name, 1000).unwrap_or_default();
    format!(
        "Session `{}`\nModel: {}\nThinking: {:?}\nUnsummarized messages: {}",
        session.name,
        session.model_id.as_deref().unwrap_or("(default)"),
        session.thinking_mode,
        recent.iter().filter(|m| !m.summarized).count()
    )
}

fn cmd_history<C: BridgeContext>(ctx: &C, session: &Session, rest: &str) -> String {
    let mut args = rest.splitn(2, char::is_whitespace);
    match args.next().unwrap_or("") {
        "search" => {
            let query = args.next().unwrap_or("").trim();
            if query.is_empty() {
                return "Usage: /history search <query>".to_string();
            }
            let results = ctx.memory().search_messages(Some(&session.name), query, 20).unwrap_or_default();
            format_messages(&results)
        }
        "stats" => {
            let all = ctx.memory().recent_messages(&session.name, 100_000).unwrap_or_default();
            let user = all.iter().filter(|m| m.role == MessageRole::User).count();
            let assistant = all.iter().filter(|m| m.role == MessageRole::Assistant).count();
            format!("Messages: {} total ({user} user, {assistant} assistant)", all.len())
        }
        "all" => format_messages(&ctx.memory().recent_messages(&session.name, 100_000).unwrap_or_default()),
        _ => format_messages(&ctx.memory().recent_messages(&session.name, 20).unwrap_or_default()),
    }
}

fn format_messages(messages: &[skynet_memory::Message]) -> String {
    if messages.is_empty() {
        return "No messages.".to_string();
    }
    messages.iter().map(|m| format!("[{}] {}: {}", m.created_at, m.role, truncate(&m.content, 200))).collect::<Vec<_>>().join("\n")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}…", s.chars().take(max).collect::<String>())
    }
}

// ---------------------------------------------------------------------
// Scheduling / monitoring / ops
// ---------------------------------------------------------------------

fn cmd_cron<C: BridgeContext>(ctx: &C, session: &Session, rest: &str) -> String {
    let mut args = rest.splitn(2, char::is_whitespace);
    match args.next().unwrap_or("") {
        "add" => {
            let rest2 = args.next().unwrap_or("");
            let (words, remainder) = take_words(rest2, 6);
            let name = words.first().copied().unwrap_or("");
            let cron_fields = if words.len() > 1 { &words[1..] } else { &[] };
            if name.is_empty() || cron_fields.len() < 5 || remainder.is_empty() {
                return "Usage: /cron add <name> <5-field cron expr> <prompt>".to_string();
            }
            let cron_expr = cron_fields.join(" ");
            match ctx.scheduler().add_cron_job(name, &cron_expr, remainder, &session.name, false, None) {
                Ok(job) => format!("Added cron job `{}` ({}).", job.name, job.cron_expression),
                Err(e) => format!("Failed: {e}"),
            }
        }
        "remove" => {
            let name = args.next().unwrap_or("").trim();
            match ctx.scheduler().remove_cron_job(name) {
                Ok(()) => format!("Removed cron job `{name}`."),
                Err(e) => format!("Failed: {e}"),
            }
        }
        "pause" => set_cron_enabled(ctx, args.next().unwrap_or("").trim(), false),
        "resume" => set_cron_enabled(ctx, args.next().unwrap_or("").trim(), true),
        "" | "list" => {
            let jobs = ctx.scheduler().list_cron_jobs().unwrap_or_default();
            if jobs.is_empty() {
                return "No cron jobs.".to_string();
            }
            jobs.iter()
                .map(|j| format!("{} [{}] {} — {}", j.name, if j.enabled { "on" } else { "paused" }, j.cron_expression, j.prompt))
                .collect::<Vec<_>>()
                .join("\n")
        }
        other => format!("Unknown /cron subcommand: `{other}`"),
    }
}

fn set_cron_enabled<C: BridgeContext>(ctx: &C, name: &str, enabled: bool) -> String {
    if name.is_empty() {
        return "Usage: /cron pause|resume <name>".to_string();
    }
    match ctx.scheduler().set_cron_job_enabled(name, enabled) {
        Ok(()) => format!("Cron job `{name}` {}.", if enabled { "resumed" } else { "paused" }),
        Err(e) => format!("Failed: {e}"),
    }
}

fn cmd_heartbeat<C: BridgeContext>(ctx: &C, rest: &str) -> String {
    let mut args = rest.splitn(2, char::is_whitespace);
    match args.next().unwrap_or("") {
        "add" => {
            let rest2 = args.next().unwrap_or("");
            let mut inner = rest2.splitn(2, char::is_whitespace);
            let (Some(name), Some(prompt)) = (inner.next(), inner.next()) else {
                return "Usage: /heartbeat add <name> <prompt>".to_string();
            };
            match ctx.scheduler().add_heartbeat_check(name, prompt) {
                Ok(h) => format!("Added heartbeat check `{}`.", h.name),
                Err(e) => format!("Failed: {e}"),
            }
        }
        "remove" => {
            let name = args.next().unwrap_or("").trim();
            match ctx.scheduler().remove_heartbeat_check(name) {
                Ok(()) => format!("Removed heartbeat check `{name}`."),
                Err(e) => format!("Failed: {e}"),
            }
        }
        "pause" | "off" => set_heartbeat_enabled(ctx, args.next().unwrap_or("").trim(), false),
        "resume" | "on" => set_heartbeat_enabled(ctx, args.next().unwrap_or("").trim(), true),
        "now" => "Heartbeat checks run on the scheduler's own cadence; there is no immediate trigger yet.".to_string(),
        "" | "list" => {
            let checks = ctx.scheduler().list_heartbeat_checks().unwrap_or_default();
            if checks.is_empty() {
                return "No heartbeat checks.".to_string();
            }
            checks
                .iter()
                .map(|h| format!("{} [{}] {}", h.name, if h.enabled { "on" } else { "paused" }, h.prompt))
                .collect::<Vec<_>>()
                .join("\n")
        }
        other => format!("Unknown /heartbeat subcommand: `{other}`"),
    }
}

fn set_heartbeat_enabled<C: BridgeContext>(ctx: &C, name: &str, enabled: bool) -> String {
    if name.is_empty() {
        return "Usage: /heartbeat pause|resume <name>".to_string();
    }
    match ctx.scheduler().set_heartbeat_check_enabled(name, enabled) {
        Ok(()) => format!("Heartbeat check `{name}` {}.", if enabled { "resumed" } else { "paused" }),
        Err(e) => format!("Failed: {e}"),
    }
}

fn cmd_monitor<C: BridgeContext>(ctx: &C, rest: &str) -> String {
    let mut args = rest.splitn(2, char::is_whitespace);
    match args.next().unwrap_or("") {
        "topic" => monitor_topic(ctx, args.next().unwrap_or("")),
        "entity" => monitor_entity(ctx, args.next().unwrap_or("")),
        "resource" => monitor_resource(ctx, args.next().unwrap_or("")),
        "subscribe" => monitor_subscribe(ctx, args.next().unwrap_or("")),
        "check" => "Monitor checks run asynchronously; use /monitor digest to see results once they land.".to_string(),
        "baseline" => "Baseline generation runs asynchronously; use /monitor digest afterwards.".to_string(),
        "report" => "Report generation runs asynchronously; check the reports directory once it completes.".to_string(),
        "digest" => {
            let digests = ctx.monitor().list_digests(None, None, 10).unwrap_or_default();
            if digests.is_empty() {
                return "No digests yet.".to_string();
            }
            digests.iter().map(|d| format!("[{}] {:?}: {}", d.created_at, d.change_type, d.summary)).collect::<Vec<_>>().join("\n")
        }
        other => format!("Unknown /monitor subcommand: `{other}`"),
    }
}

fn monitor_topic<C: BridgeContext>(ctx: &C, rest: &str) -> String {
    let mut args = rest.splitn(2, char::is_whitespace);
    match args.next().unwrap_or("") {
        "add" => {
            let rest2 = args.next().unwrap_or("");
            let mut inner = rest2.splitn(2, char::is_whitespace);
            let name = inner.next().unwrap_or("").trim();
            if name.is_empty() {
                return "Usage: /monitor topic add <name> [description]".to_string();
            }
            let description = inner.next().filter(|d| !d.is_empty());
            match ctx.monitor().create_topic(name, description) {
                Ok(t) => format!("Created topic `{}`.", t.name),
                Err(e) => format!("Failed: {e}"),
            }
        }
        "remove" => match ctx.monitor().delete_topic(args.next().unwrap_or("").trim()) {
            Ok(()) => "Topic removed.".to_string(),
            Err(e) => format!("Failed: {e}"),
        },
        "" | "list" => {
            let topics = ctx.monitor().list_topics().unwrap_or_default();
            if topics.is_empty() {
                return "No topics yet.".to_string();
            }
            topics.iter().map(|t| t.name.clone()).collect::<Vec<_>>().join("\n")
        }
        other => format!("Unknown /monitor topic subcommand: `{other}`"),
    }
}

fn monitor_entity<C: BridgeContext>(ctx: &C, rest: &str) -> String {
    let mut args = rest.splitn(2, char::is_whitespace);
    match args.next().unwrap_or("") {
        "add" => {
            let fields: Vec<&str> = args.next().unwrap_or("").splitn(4, char::is_whitespace).collect();
            let (&[topic, name, url, kind], true) = (fields.as_slice(), fields.len() == 4) else {
                return "Usage: /monitor entity add <topic> <name> <url> <type>".to_string();
            };
            let Ok(entity_type) = kind.parse::<EntityType>() else {
                return format!("Unknown entity type: `{kind}`");
            };
            match ctx.monitor().create_entity(topic, name, url, entity_type) {
                Ok(e) => format!("Created entity `{}`.", e.name),
                Err(e) => format!("Failed: {e}"),
            }
        }
        "remove" => match ctx.monitor().delete_entity(args.next().unwrap_or("").trim()) {
            Ok(()) => "Entity removed.".to_string(),
            Err(e) => format!("Failed: {e}"),
        },
        "" | "list" => {
            let entities = ctx.monitor().list_entities(None).unwrap_or_default();
            if entities.is_empty() {
                return "No entities yet.".to_string();
            }
            entities.iter().map(|e| format!("{} ({})", e.name, e.url)).collect::<Vec<_>>().join("\n")
        }
        other => format!("Unknown /monitor entity subcommand: `{other}`"),
    }
}

fn monitor_resource<C: BridgeContext>(ctx: &C, rest: &str) -> String {
    let mut args = rest.splitn(2, char::is_whitespace);
    match args.next().unwrap_or("") {
        "add" => {
            let fields: Vec<&str> = args.next().unwrap_or("").splitn(4, char::is_whitespace).collect();
            let (&[entity, name, url, kind], true) = (fields.as_slice(), fields.len() == 4) else {
                return "Usage: /monitor resource add <entity> <name> <url> <type>".to_string();
            };
            let Ok(resource_type) = kind.parse::<ResourceType>() else {
                return format!("Unknown resource type: `{kind}`");
            };
            match ctx.monitor().create_resource(entity, name, url, resource_type) {
                Ok(r) => format!("Created resource `{}`.", r.name),
                Err(e) => format!("Failed: {e}"),
            }
        }
        "remove" => {
            let Some(id) = args.next().and_then(|s| s.trim().parse::<i64>().ok()) else {
                return "Usage: /monitor resource remove <id>".to_string();
            };
            match ctx.monitor().delete_resource(id) {
                Ok(()) => "Resource removed.".to_string(),
                Err(e) => format!("Failed: {e}"),
            }
        }
        "" | "list" => {
            let resources = ctx.monitor().list_resources(None, None, false).unwrap_or_default();
            if resources.is_empty() {
                return "No resources yet.".to_string();
            }
            resources.iter().map(|r| format!("#{} {} ({})", r.id, r.name, r.url)).collect::<Vec<_>>().join("\n")
        }
        other => format!("Unknown /monitor resource subcommand: `{other}`"),
    }
}

fn monitor_subscribe<C: BridgeContext>(ctx: &C, rest: &str) -> String {
    let topic = rest.trim();
    if topic.is_empty() {
        return "Usage: /monitor subscribe <topic>".to_string();
    }
    let topics = ctx.monitor().list_topics().unwrap_or_default();
    let Some(t) = topics.into_iter().find(|t| t.name == topic) else {
        return format!("No such topic: `{topic}`");
    };
    let config = serde_json::json!({ "chat_id": ctx.principal().user_id });
    match ctx.monitor().subscribe(ChannelType::Telegram, config, Some(t.id), None, None) {
        Ok(_) => format!("Subscribed to `{topic}`."),
        Err(e) => format!("Failed: {e}"),
    }
}

// ---------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------

fn cmd_help() -> String {
    "Session: /new /sessions /switch /delete /rename /stream /permissions\n\
     Workspace: /cd /dirs /file\n\
     Tuning: /think /effort /model /autonomous\n\
     Persona/memory: /persona /mcp /skills /memory /summaries\n\
     Usage/context: /usage /compact /context /history\n\
     Scheduling: /cron /heartbeat\n\
     Monitoring: /monitor\n\
     Admin: /help /current /restart /release /doctor"
        .to_string()
}

fn cmd_current(session: &Session) -> String {
    format!(
        "Session `{}`\nCwd: {}\nModel: {}\nPermission: {:?}\nStreaming: {}",
        session.name,
        session.cwd,
        session.model_id.as_deref().unwrap_or("(default)"),
        session.permission_mode,
        session.streaming
    )
}

async fn cmd_restart<C: BridgeContext>(ctx: &C, transport: &dyn Transport, chat_id: i64) -> String {
    let action = skynet_agent::actions::ParsedAction {
        action: "restart".to_string(),
        path: None,
        caption: None,
        category: None,
        key: None,
        value: None,
    };
    let errors = skynet_agent::actions::execute_actions(&[action], transport, ctx.memory(), chat_id).await;
    if errors.is_empty() {
        "Restarting…".to_string()
    } else {
        format!("Restart failed: {}", errors.join("; "))
    }
}

fn cmd_release(session: &Session, version: &str) -> String {
    let version = version.trim().trim_start_matches('v');
    if version.is_empty() || !version.split('.').all(|p| p.chars().all(|c| c.is_ascii_digit())) || version.split('.').count() != 3 {
        return "Usage: /release <version>\nExample: /release 0.2.0".to_string();
    }

    let tag = format!("v{version}");
    let run = |args: &[&str]| {
        std::process::Command::new("git").args(args).current_dir(&session.cwd).output()
    };

    let steps: &[&[&str]] = &[
        &["tag", &tag],
        &["push"],
        &["push", "--tags"],
    ];
    for step in steps {
        match run(step) {
            Ok(out) if out.status.success() => {}
            Ok(out) => return format!("Release failed at `git {}`: {}", step.join(" "), String::from_utf8_lossy(&out.stderr)),
            Err(e) => return format!("Release failed at `git {}`: {e}", step.join(" ")),
        }
    }

    format!("Released {tag}.\n• Tag {tag} pushed\n• CI will publish from here")
}

fn cmd_doctor<C: BridgeContext>(ctx: &C) -> String {
    let mut checks = Vec::new();

    checks.push(if ctx.principal().is_configured() {
        "OK principal configured".to_string()
    } else {
        "WARN no principal configured yet (ID-discovery mode)".to_string()
    });

    let sessions = ctx.sessions().list_all();
    checks.push(format!("Sessions: {} total", sessions.len()));

    checks.push(if ctx.scheduler().is_running() {
        "OK scheduler running".to_string()
    } else {
        "WARN scheduler not running".to_string()
    });

    checks.join("\n")
}
