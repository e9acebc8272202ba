use serde::{Deserialize, Serialize};

/// A recurring prompt fired on a 5-field cron schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronJob {
    pub name: String,
    /// 5-field minute/hour/dom/month/dow expression.
    pub cron_expression: String,
    pub prompt: String,
    pub session_name: String,
    /// When true, each firing runs in a throwaway `cron:<name>` session
    /// instead of `session_name`.
    pub isolated: bool,
    pub enabled: bool,
    /// IANA zone (e.g. `"Europe/Tbilisi"`); falls back to UTC if absent or unknown.
    pub timezone: Option<String>,
    pub last_run_at: Option<String>,
    pub created_at: String,
}

impl CronJob {
    /// The cron evaluator is seeded by the last firing, or by creation time
    /// for a job that has never fired.
    pub fn seed_instant(&self) -> &str {
        self.last_run_at.as_deref().unwrap_or(&self.created_at)
    }
}

/// A prompt the Agent is asked to answer with `HEARTBEAT_OK`, or a
/// user-facing alert if anything looks wrong.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatCheck {
    pub name: String,
    pub prompt: String,
    pub enabled: bool,
}
