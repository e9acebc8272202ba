use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("topic not found: {0}")]
    TopicNotFound(String),

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(i64),

    #[error("unsafe fetch URL: {0}")]
    UnsafeUrl(String),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
