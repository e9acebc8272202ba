//! The dependency surface a command handler needs beyond what the Turn
//! Engine already requires. Kept as a trait — rather than a concrete struct
//! living in this crate — so this crate never has to own the process-wide
//! wiring (database pools, the scheduler's background task, dashboard
//! token storage); that lives one layer up, alongside the binary's `main`.

use serde::Serialize;
use skynet_core::config::PrincipalConfig;
use skynet_monitor::MonitorManager;
use skynet_scheduler::SchedulerHandle;

/// A bearer token granting access to the dashboard HTTP API.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardToken {
    pub token: String,
    pub label: String,
    pub created_at: String,
}

/// Turn-accounting totals for a session, as persisted by whatever store
/// implements `record_usage` on the `TurnContext` side.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageSummary {
    pub num_turns: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

pub trait BridgeContext: skynet_agent::TurnContext {
    fn principal(&self) -> &PrincipalConfig;
    fn scheduler(&self) -> &SchedulerHandle;
    fn monitor(&self) -> &MonitorManager;

    /// Mint a new dashboard bearer token and persist it, returning the
    /// plaintext value (shown to the operator exactly once).
    fn create_dashboard_token(&self, label: &str) -> Result<DashboardToken, String>;
    fn list_dashboard_tokens(&self) -> Result<Vec<DashboardToken>, String>;
    fn revoke_dashboard_token(&self, token: &str) -> Result<bool, String>;

    /// Usage totals for one session, or across all sessions when `session_name` is `None`.
    fn usage_summary(&self, session_name: Option<&str>) -> Result<UsageSummary, String>;
}
