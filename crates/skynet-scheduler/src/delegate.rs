use async_trait::async_trait;

/// Everything the scheduler needs from the rest of the bridge to actually
/// execute what it decides is due, without depending on the Agent or
/// Telegram crates directly.
///
/// `skynet-gateway` implements this over the running `AppState`; the engine
/// only ever sees the trait object.
#[async_trait]
pub trait SchedulerDelegate: Send + Sync {
    /// Run `prompt` in `session_name` (creating an isolated throwaway session
    /// first if the caller asks for one) and return the Agent's raw reply.
    async fn run_prompt(&self, session_name: &str, prompt: &str) -> anyhow::Result<String>;

    /// Run a full monitor sweep: check all topics, notify subscribers, post
    /// the digest to the default chat.
    async fn run_monitor_sweep(&self);

    /// Deliver `text` to the default chat (used for heartbeat alerts and
    /// monitor digests that don't already self-deliver).
    async fn post_to_default_chat(&self, text: &str);
}
