use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock, Weak};

use async_trait::async_trait;
use axum::{routing::get, Router};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use skynet_agent::invoker::{AgentEvent, AgentInvoker, TurnRequest};
use skynet_agent::transport::Transport;
use skynet_agent::turn::{TurnContext, TurnUsageRecord};
use skynet_core::config::{BridgeConfig, PrincipalConfig, MONITOR_SWEEP_HOURS, SUMMARY_THRESHOLD};
use skynet_memory::MemoryManager;
use skynet_monitor::{MonitorDelegate, MonitorManager};
use skynet_scheduler::{SchedulerDelegate, SchedulerHandle};
use skynet_sessions::SessionManager;
use skynet_telegram::{BridgeContext, DashboardToken, TelegramTransport, UsageSummary};

use crate::dashboard_auth;
use crate::ws::broadcast::EventBroadcaster;

/// Central shared state — held as `Arc<AppState>` by every Axum handler and
/// by the Telegram adapter. Heavier subsystems are held behind `Arc` so
/// background tasks spawned off the Turn Engine (summarization, scheduler
/// prompts, monitor sweeps) can hold a `'static` clone without borrowing
/// `AppState` itself.
pub struct AppState {
    pub config: BridgeConfig,
    pub broadcaster: EventBroadcaster,
    pub invoker: Arc<AgentInvoker>,
    pub memory: Arc<MemoryManager>,
    pub sessions: Arc<SessionManager>,
    pub scheduler: Arc<SchedulerHandle>,
    pub monitor: Arc<MonitorManager>,
    pub telegram: Arc<TelegramTransport>,
    /// Chat id of the most recent turn, used as the destination for
    /// heartbeat alerts and monitor digests that don't target a specific
    /// subscriber.
    pub default_chat_id: Mutex<Option<i64>>,
}

/// Both the scheduler and the monitor engine want an `Arc<dyn Delegate>` at
/// construction time, before `AppState` itself exists. This adapter is built
/// first, handed to both as a trait object, and pointed at the real
/// `AppState` once it's alive via `bind`.
struct GatewayDelegate {
    state: OnceLock<Weak<AppState>>,
}

impl GatewayDelegate {
    fn new() -> Self {
        Self { state: OnceLock::new() }
    }

    fn bind(&self, state: &Arc<AppState>) {
        let _ = self.state.set(Arc::downgrade(state));
    }

    fn state(&self) -> Arc<AppState> {
        self.state
            .get()
            .and_then(Weak::upgrade)
            .expect("gateway delegate used before AppState finished constructing")
    }
}

#[async_trait]
impl SchedulerDelegate for GatewayDelegate {
    async fn run_prompt(&self, session_name: &str, prompt: &str) -> anyhow::Result<String> {
        self.state().run_prompt(session_name, prompt).await
    }

    async fn run_monitor_sweep(&self) {
        self.state().monitor.run_full_sweep().await;
    }

    async fn post_to_default_chat(&self, text: &str) {
        self.state().post_to_default_chat(text).await;
    }
}

#[async_trait]
impl MonitorDelegate for GatewayDelegate {
    async fn ask_agent(&self, session_name: &str, prompt: &str) -> anyhow::Result<String> {
        self.state().run_prompt(session_name, prompt).await
    }

    async fn deliver_telegram(&self, chat_config: &serde_json::Value, text: &str) {
        self.state().deliver_telegram(chat_config, text).await;
    }

    async fn post_to_default_chat(&self, text: &str) {
        self.state().post_to_default_chat(text).await;
    }
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: BridgeConfig,
        invoker: AgentInvoker,
        memory: MemoryManager,
        sessions: SessionManager,
        telegram: TelegramTransport,
        scheduler_db_path: PathBuf,
        monitor_db_path: PathBuf,
        reports_dir: PathBuf,
    ) -> anyhow::Result<Arc<Self>> {
        let delegate = Arc::new(GatewayDelegate::new());

        let scheduler = SchedulerHandle::new(
            scheduler_db_path,
            delegate.clone() as Arc<dyn SchedulerDelegate>,
            config.scheduler.tick_secs,
            config.scheduler.heartbeat_minutes,
            MONITOR_SWEEP_HOURS.to_vec(),
        )?;
        let monitor = MonitorManager::open(monitor_db_path, delegate.clone() as Arc<dyn MonitorDelegate>, reports_dir)?;

        let state = Arc::new(Self {
            config,
            broadcaster: EventBroadcaster::new(),
            invoker: Arc::new(invoker),
            memory: Arc::new(memory),
            sessions: Arc::new(sessions),
            scheduler: Arc::new(scheduler),
            monitor: Arc::new(monitor),
            telegram: Arc::new(telegram),
            default_chat_id: Mutex::new(None),
        });
        delegate.bind(&state);
        Ok(state)
    }

    pub fn remember_chat(&self, chat_id: i64) {
        *self.default_chat_id.lock().unwrap() = Some(chat_id);
    }

    async fn run_prompt(&self, session_name: &str, prompt: &str) -> anyhow::Result<String> {
        let cwd = match self.sessions.get(session_name) {
            Some(s) => s.cwd,
            None => self.config.persistence.home.clone(),
        };
        run_isolated(&self.invoker, prompt, &cwd).await
    }

    async fn deliver_telegram(&self, chat_config: &serde_json::Value, text: &str) {
        let Some(chat_id) = chat_config.get("chat_id").and_then(|v| v.as_i64()) else {
            warn!("monitor subscriber missing chat_id in channel_config");
            return;
        };
        let _ = self.telegram.reply(chat_id, text).await;
    }

    async fn post_to_default_chat(&self, text: &str) {
        if let Some(chat_id) = *self.default_chat_id.lock().unwrap() {
            let _ = self.telegram.reply(chat_id, text).await;
        }
    }
}

impl TurnContext for AppState {
    fn invoker(&self) -> &AgentInvoker {
        &self.invoker
    }

    fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    fn record_usage(&self, record: TurnUsageRecord) {
        if let Err(e) = self.memory.record_usage(
            &record.session_name,
            record.user_id.as_deref(),
            record.input_tokens,
            record.output_tokens,
            record.cost_usd,
            record.duration_ms,
            record.num_turns,
        ) {
            warn!(session = %record.session_name, error = %e, "failed to persist usage record");
        }
    }

    fn maybe_summarize(&self, session_name: &str) {
        if let Ok(recent) = self.memory.recent_messages(session_name, 2) {
            for msg in recent.into_iter().rev() {
                self.broadcaster.send(
                    serde_json::json!({
                        "id": msg.id,
                        "session_name": msg.session_name,
                        "role": msg.role.to_string(),
                        "content": msg.content,
                        "created_at": msg.created_at,
                    })
                    .to_string(),
                );
            }
        }

        match self.memory.needs_summary(session_name, SUMMARY_THRESHOLD) {
            Ok(true) => {}
            _ => return,
        }

        let memory = self.memory.clone();
        let invoker = self.invoker.clone();
        let session_name = session_name.to_string();
        let cwd = self.config.persistence.home.clone();
        tokio::spawn(async move {
            let built = match memory.build_summarize_prompt(&session_name) {
                Ok(Some(built)) => built,
                Ok(None) => return,
                Err(e) => {
                    warn!(%session_name, error = %e, "failed to build summarize prompt");
                    return;
                }
            };
            let (ids, prompt) = built;
            match run_isolated(&invoker, &prompt, &cwd).await {
                Ok(raw) => {
                    if let Err(e) = memory.apply_summary(&session_name, &raw, &ids, None) {
                        warn!(%session_name, error = %e, "failed to apply summary");
                    }
                }
                Err(e) => warn!(%session_name, error = %e, "summarization agent call failed"),
            }
        });
    }
}

impl BridgeContext for AppState {
    fn principal(&self) -> &PrincipalConfig {
        &self.config.principal
    }

    fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    fn monitor(&self) -> &MonitorManager {
        &self.monitor
    }

    fn create_dashboard_token(&self, label: &str) -> Result<DashboardToken, String> {
        let raw = uuid::Uuid::new_v4().to_string();
        let hash = dashboard_auth::hash_token(&raw);
        let stored = self.memory.create_dashboard_token(label, &hash).map_err(|e| e.to_string())?;
        Ok(DashboardToken { token: raw, label: stored.label, created_at: stored.created_at })
    }

    fn list_dashboard_tokens(&self) -> Result<Vec<DashboardToken>, String> {
        let stored = self.memory.list_dashboard_tokens().map_err(|e| e.to_string())?;
        Ok(stored
            .into_iter()
            .map(|t| DashboardToken { token: "(hidden)".to_string(), label: t.label, created_at: t.created_at })
            .collect())
    }

    fn revoke_dashboard_token(&self, token: &str) -> Result<bool, String> {
        let hash = dashboard_auth::hash_token(token);
        self.memory.revoke_dashboard_token(&hash).map_err(|e| e.to_string())
    }

    fn usage_summary(&self, session_name: Option<&str>) -> Result<UsageSummary, String> {
        let totals = self.memory.usage_totals(session_name).map_err(|e| e.to_string())?;
        Ok(UsageSummary {
            num_turns: totals.num_turns,
            input_tokens: totals.input_tokens,
            output_tokens: totals.output_tokens,
            cost_usd: totals.cost_usd,
        })
    }
}

/// Run one throwaway, non-resumed agent turn and collect its full text.
/// Used by the scheduler and monitor delegates, and by summarization —
/// none of which have a live `Transport` to stream into.
async fn run_isolated(invoker: &AgentInvoker, prompt: &str, cwd: &str) -> anyhow::Result<String> {
    let (tx, mut rx) = mpsc::channel::<AgentEvent>(64);
    let cancel = CancellationToken::new();
    let req = TurnRequest {
        model: None,
        system_prompt: "You are Skynet's background agent, running an isolated one-shot task. Reply with plain text only.",
        prompt,
        resume_thread_id: None,
        permission_mode: skynet_sessions::PermissionMode::Default,
        cwd,
        extra_dirs: &[],
    };

    let run_fut = invoker.run_turn(&req, tx, cancel);
    tokio::pin!(run_fut);

    let mut text = String::new();
    let mut done = false;
    loop {
        tokio::select! {
            res = &mut run_fut, if !done => {
                done = true;
                res?;
            }
            event = rx.recv() => {
                match event {
                    Some(AgentEvent::TextChunk(chunk)) => text.push_str(&chunk),
                    Some(AgentEvent::Result(result)) => {
                        if result.is_error && text.is_empty() {
                            anyhow::bail!("agent returned an error");
                        }
                        text = result.text;
                    }
                    Some(_) => {}
                    None => break,
                }
            }
        }
    }
    Ok(text)
}

/// Assemble the full Axum router: the read-only Dashboard API plus the
/// live-message WebSocket stream.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(crate::http::dashboard::router())
        .route("/ws/messages", get(crate::ws::stream::ws_messages_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
