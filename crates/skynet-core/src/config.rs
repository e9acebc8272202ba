use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Telegram HTML message cap; also used as the default split-chunk target.
pub const MAX_MESSAGE_LEN: usize = 4096;
/// Default scheduler tick period.
pub const SCHEDULER_TICK_SECS: u64 = 60;
/// Default heartbeat interval (minutes). 0 disables heartbeat entirely.
pub const DEFAULT_HEARTBEAT_MINUTES: u64 = 30;
/// UTC hours at which a monitor sweep fires, at most once per boundary.
pub const MONITOR_SWEEP_HOURS: [u32; 4] = [8, 12, 16, 20];
/// Unsummarized-message count that triggers a background summarization.
pub const SUMMARY_THRESHOLD: usize = 20;
pub const DEFAULT_DASHBOARD_PORT: u16 = 8787;
pub const DEFAULT_DASHBOARD_BIND: &str = "127.0.0.1";

/// Top-level config (bridge.toml + BRIDGE_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub principal: PrincipalConfig,
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
}

/// Identifies the single allow-listed principal this bridge answers to.
///
/// If both fields are absent, the process runs in ID-discovery mode: any
/// incoming message is answered with the caller's own principal id instead
/// of being processed as a turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrincipalConfig {
    /// Numeric Telegram user id. Checked before `username`.
    pub user_id: Option<i64>,
    /// Telegram @username, without the leading `@`. Checked if `user_id` is absent.
    pub username: Option<String>,
}

impl PrincipalConfig {
    pub fn is_configured(&self) -> bool {
        self.user_id.is_some() || self.username.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Path or bare name of the coding-agent CLI binary.
    #[serde(default = "default_agent_command")]
    pub command: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_permission_mode")]
    pub default_permission_mode: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: default_agent_command(),
            model: default_model(),
            default_permission_mode: default_permission_mode(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Where the bridge's on-disk state lives: session registry JSON, generated
/// monitor reports, and the transient restart-notify marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_home")]
    pub home: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            home: default_home(),
        }
    }
}

impl PersistenceConfig {
    pub fn sessions_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.home).join("sessions/sessions.json")
    }

    pub fn reports_dir(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.home).join("reports")
    }

    pub fn restart_notify_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.home).join("restart_notify.json")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    #[serde(default = "default_heartbeat_minutes")]
    pub heartbeat_minutes: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: SCHEDULER_TICK_SECS,
            heartbeat_minutes: DEFAULT_HEARTBEAT_MINUTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
    #[serde(default = "default_dashboard_bind")]
    pub bind: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_DASHBOARD_PORT,
            bind: DEFAULT_DASHBOARD_BIND.to_string(),
        }
    }
}

/// Voice transcription is an optional text-producing plugin (§1 out of core
/// scope). Disabled unless a model size is configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoiceConfig {
    pub model_size: Option<String>,
}

impl VoiceConfig {
    pub fn enabled(&self) -> bool {
        self.model_size.is_some()
    }
}

fn default_agent_command() -> String {
    "claude".to_string()
}
fn default_model() -> String {
    "claude-sonnet-4-6".to_string()
}
fn default_permission_mode() -> String {
    "default".to_string()
}
fn default_tick_secs() -> u64 {
    SCHEDULER_TICK_SECS
}
fn default_heartbeat_minutes() -> u64 {
    DEFAULT_HEARTBEAT_MINUTES
}
fn default_dashboard_port() -> u16 {
    DEFAULT_DASHBOARD_PORT
}
fn default_dashboard_bind() -> String {
    DEFAULT_DASHBOARD_BIND.to_string()
}
fn default_home() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.megobari", home)
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.megobari/megobari.db", home)
}

impl BridgeConfig {
    /// Load config from a TOML file with BRIDGE_* env var overrides.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: BridgeConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("BRIDGE_").split("_"))
            .extract()
            .map_err(|e| crate::error::BridgeError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.megobari/bridge.toml", home)
}
