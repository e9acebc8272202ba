//! `skynet-scheduler` — cooperative tick loop driving cron jobs, heartbeat
//! health checks, and periodic monitor sweeps.
//!
//! # Tick order
//!
//! Every [`SchedulerConfig`]-driven tick, in this order:
//! 1. Fire any enabled cron job whose next occurrence (from its 5-field
//!    expression, optionally timezone-aware) has arrived.
//! 2. Run a monitor sweep at most once per quantized UTC hour boundary.
//! 3. Run the heartbeat check once the configured interval has elapsed.
//!
//! Execution itself — invoking the Agent, delivering a message, running a
//! monitor pass — is not owned by this crate. It's handed off through
//! [`SchedulerDelegate`] so the scheduler never depends on the Agent or
//! Telegram crates.

pub mod cron;
pub mod cron_job;
pub mod db;
pub mod delegate;
pub mod engine;
pub mod error;
pub mod heartbeat;
pub mod state;
pub mod types;

pub use delegate::SchedulerDelegate;
pub use engine::{SchedulerEngine, SchedulerHandle};
pub use error::{Result, SchedulerError};
pub use types::{CronJob, HeartbeatCheck};
