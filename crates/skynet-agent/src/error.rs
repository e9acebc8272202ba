use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("session '{0}' is busy with another turn")]
    Busy(String),

    #[error("agent process error: {0}")]
    Process(String),

    #[error("agent returned malformed output: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Memory(#[from] skynet_memory::MemoryError),

    #[error(transparent)]
    Session(#[from] skynet_sessions::SessionError),
}

pub type Result<T> = std::result::Result<T, AgentError>;
