use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No cron job with this name exists.
    #[error("cron job not found: {0}")]
    CronJobNotFound(String),

    /// A cron job with this name already exists.
    #[error("cron job already exists: {0}")]
    CronJobAlreadyExists(String),

    /// No heartbeat check with this name exists.
    #[error("heartbeat check not found: {0}")]
    HeartbeatCheckNotFound(String),

    /// A heartbeat check with this name already exists.
    #[error("heartbeat check already exists: {0}")]
    HeartbeatCheckAlreadyExists(String),

    /// The cron expression could not be parsed.
    #[error("invalid cron expression: {0}")]
    InvalidCronExpression(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
