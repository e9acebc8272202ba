use std::net::SocketAddr;
use std::path::Path;

use clap::{Parser, Subcommand};
use teloxide::Bot;
use tracing::{info, warn};

use skynet_agent::invoker::AgentInvoker;
use skynet_core::config::BridgeConfig;
use skynet_memory::MemoryManager;
use skynet_sessions::SessionManager;
use skynet_telegram::{TelegramAdapter, TelegramTransport};

mod app;
mod dashboard_auth;
mod http;
mod mcp_bridge;
mod ws;

/// Skynet bridge: Telegram adapter, scheduler, and dashboard in one process.
#[derive(Parser)]
#[command(name = "skynet-gateway")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the bridge (telegram adapter + scheduler + dashboard). Default when no subcommand is given.
    Run,
    /// Mint/list/revoke dashboard bearer tokens from the command line.
    DashboardToken {
        #[command(subcommand)]
        action: DashboardTokenAction,
    },
    /// Stdio MCP server for the coding-agent CLI. Invoked internally by `AgentInvoker`.
    McpBridge,
}

#[derive(Subcommand)]
enum DashboardTokenAction {
    /// Mint a new token under `label` and print the raw value once.
    Mint { label: String },
    /// List all tokens (hashes only — the raw value is never stored).
    List,
    /// Revoke a token by its raw value.
    Revoke { token: String },
}

fn load_config() -> BridgeConfig {
    let config_path = std::env::var("SKYNET_CONFIG").ok();
    BridgeConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({e}), using defaults — bot token will be empty");
        BridgeConfig {
            principal: Default::default(),
            telegram: skynet_core::config::TelegramConfig { bot_token: String::new() },
            agent: Default::default(),
            database: Default::default(),
            persistence: Default::default(),
            scheduler: Default::default(),
            dashboard: Default::default(),
            voice: Default::default(),
        }
    })
}

fn open_memory(config: &BridgeConfig) -> anyhow::Result<MemoryManager> {
    std::fs::create_dir_all(&config.persistence.home)?;
    let conn = rusqlite::Connection::open(&config.database.path)?;
    Ok(MemoryManager::new(conn)?)
}

fn run_dashboard_token(config: &BridgeConfig, action: DashboardTokenAction) -> anyhow::Result<()> {
    let memory = open_memory(config)?;
    match action {
        DashboardTokenAction::Mint { label } => {
            let raw = uuid::Uuid::new_v4().to_string();
            let hash = dashboard_auth::hash_token(&raw);
            let token = memory.create_dashboard_token(&label, &hash)?;
            println!("minted token for '{}': {}", token.label, raw);
            println!("(this value is shown once — store it now)");
        }
        DashboardTokenAction::List => {
            for token in memory.list_dashboard_tokens()? {
                let used = token.last_used_at.as_deref().unwrap_or("never");
                println!("{}\tenabled={}\tcreated={}\tlast_used={}", token.label, token.enabled, token.created_at, used);
            }
        }
        DashboardTokenAction::Revoke { token } => {
            let hash = dashboard_auth::hash_token(&token);
            if memory.revoke_dashboard_token(&hash)? {
                println!("revoked");
            } else {
                println!("no matching token");
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skynet_gateway=info,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config();

    match cli.command.unwrap_or(Command::Run) {
        Command::McpBridge => return mcp_bridge::run(&config).await,
        Command::DashboardToken { action } => return run_dashboard_token(&config, action),
        Command::Run => {}
    }

    std::fs::create_dir_all(&config.persistence.home)?;
    std::fs::create_dir_all(config.persistence.reports_dir())?;

    let conn = rusqlite::Connection::open(&config.database.path)?;
    let memory = MemoryManager::new(conn)?;
    let sessions = SessionManager::load(config.persistence.sessions_path());

    let mcp_bridge_path = std::env::current_exe().ok().map(|p| p.to_string_lossy().to_string());
    let invoker = AgentInvoker::new(config.agent.command.clone()).with_mcp_bridge(mcp_bridge_path);

    let bot = Bot::new(&config.telegram.bot_token);
    let download_dir = Path::new(&config.persistence.home).join("downloads");
    std::fs::create_dir_all(&download_dir)?;
    let telegram = TelegramTransport::new(bot, download_dir.clone());

    let scheduler_db_path = Path::new(&config.persistence.home).join("scheduler.db");
    let monitor_db_path = Path::new(&config.persistence.home).join("monitor.db");
    let reports_dir = config.persistence.reports_dir();

    let state = app::AppState::new(
        config.clone(),
        invoker,
        memory,
        sessions,
        telegram,
        scheduler_db_path,
        monitor_db_path,
        reports_dir,
    )?;

    state.scheduler.start()?;

    let bind = config.dashboard.bind.clone();
    let port = config.dashboard.port;
    let router = app::build_router(state.clone());
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("skynet dashboard listening on {addr}");

    let server = axum::serve(listener, router);
    let adapter = TelegramAdapter::new(&config.telegram, state, download_dir);

    tokio::select! {
        res = server => { res?; }
        _ = adapter.run() => {}
    }

    Ok(())
}
