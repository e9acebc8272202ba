use async_trait::async_trait;

/// What the monitor engine needs from the rest of the bridge: a way to ask
/// the Agent a one-shot question in an isolated session, and a way to
/// deliver a Telegram message (Slack is delivered directly via webhook and
/// doesn't need a delegate).
#[async_trait]
pub trait MonitorDelegate: Send + Sync {
    /// Run `prompt` in a throwaway `session_name` (`monitor:*`) and return
    /// the Agent's raw reply.
    async fn ask_agent(&self, session_name: &str, prompt: &str) -> anyhow::Result<String>;

    /// Deliver `text` to the Telegram chat described by `chat_config`
    /// (the subscriber's `channel_config`, e.g. `{"chat_id": 123}`).
    async fn deliver_telegram(&self, chat_config: &serde_json::Value, text: &str);

    /// Deliver `text` to the default chat — used for the scheduler's
    /// quantized monitor-sweep digest post.
    async fn post_to_default_chat(&self, text: &str);
}
