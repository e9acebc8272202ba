use thiserror::Error;

/// Startup/config-level errors shared across the bridge binary. Each subsystem
/// crate (sessions, memory, scheduler, agent, monitor, gateway) keeps its own
/// local error type for its own domain; this one only covers what the
/// top-level process touches directly before those crates take over.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
