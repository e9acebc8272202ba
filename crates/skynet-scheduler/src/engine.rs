use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{Timelike, Utc};
use rusqlite::Connection;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::cron;
use crate::cron_job;
use crate::db::init_db;
use crate::delegate::SchedulerDelegate;
use crate::error::Result;
use crate::heartbeat;
use crate::state;
use crate::types::{CronJob, HeartbeatCheck};

/// Shared handle for cron/heartbeat CRUD plus start/stop control of the tick loop.
///
/// CRUD runs against its own connection so dashboard/Telegram handlers never
/// contend with the engine's own polling query. Starting the loop opens a
/// second, independent connection to the same database for the engine.
pub struct SchedulerHandle {
    db_path: PathBuf,
    crud_conn: Mutex<Connection>,
    delegate: Arc<dyn SchedulerDelegate>,
    tick_secs: u64,
    heartbeat_minutes: u64,
    monitor_hours: Vec<u32>,
    running: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl SchedulerHandle {
    pub fn new(
        db_path: PathBuf,
        delegate: Arc<dyn SchedulerDelegate>,
        tick_secs: u64,
        heartbeat_minutes: u64,
        monitor_hours: Vec<u32>,
    ) -> Result<Self> {
        let conn = Connection::open(&db_path)?;
        init_db(&conn)?;
        Ok(Self {
            db_path,
            crud_conn: Mutex::new(conn),
            delegate,
            tick_secs,
            heartbeat_minutes,
            monitor_hours,
            running: Mutex::new(None),
        })
    }

    // -- cron job CRUD -----------------------------------------------------

    pub fn add_cron_job(
        &self,
        name: &str,
        cron_expression: &str,
        prompt: &str,
        session_name: &str,
        isolated: bool,
        timezone: Option<&str>,
    ) -> Result<CronJob> {
        let conn = self.crud_conn.lock().unwrap();
        cron_job::create(&conn, name, cron_expression, prompt, session_name, isolated, timezone)
    }

    pub fn remove_cron_job(&self, name: &str) -> Result<()> {
        let conn = self.crud_conn.lock().unwrap();
        cron_job::delete(&conn, name)
    }

    pub fn list_cron_jobs(&self) -> Result<Vec<CronJob>> {
        let conn = self.crud_conn.lock().unwrap();
        cron_job::list(&conn)
    }

    pub fn set_cron_job_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let conn = self.crud_conn.lock().unwrap();
        cron_job::set_enabled(&conn, name, enabled)
    }

    // -- heartbeat check CRUD ------------------------------------------------

    pub fn add_heartbeat_check(&self, name: &str, prompt: &str) -> Result<HeartbeatCheck> {
        let conn = self.crud_conn.lock().unwrap();
        heartbeat::create(&conn, name, prompt)
    }

    pub fn remove_heartbeat_check(&self, name: &str) -> Result<()> {
        let conn = self.crud_conn.lock().unwrap();
        heartbeat::delete(&conn, name)
    }

    pub fn list_heartbeat_checks(&self) -> Result<Vec<HeartbeatCheck>> {
        let conn = self.crud_conn.lock().unwrap();
        heartbeat::list(&conn)
    }

    pub fn set_heartbeat_check_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let conn = self.crud_conn.lock().unwrap();
        heartbeat::set_enabled(&conn, name, enabled)
    }

    // -- lifecycle -----------------------------------------------------------

    /// Start the tick loop as a background task. A no-op if already running.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let mut running = self.running.lock().unwrap();
        if running.is_some() {
            info!("scheduler already running, ignoring start request");
            return Ok(());
        }
        let conn = Connection::open(&self.db_path)?;
        init_db(&conn)?;
        let engine = SchedulerEngine {
            conn,
            delegate: Arc::clone(&self.delegate),
            tick_secs: self.tick_secs,
            heartbeat_minutes: self.heartbeat_minutes,
            monitor_hours: self.monitor_hours.clone(),
        };
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(engine.run(rx));
        *running = Some((tx, handle));
        Ok(())
    }

    /// Stop the tick loop. Idempotent: calling this when nothing is running
    /// just clears any stale handle.
    pub fn stop(&self) {
        let mut running = self.running.lock().unwrap();
        if let Some((tx, handle)) = running.take() {
            let _ = tx.send(true);
            handle.abort();
            info!("scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().unwrap().is_some()
    }
}

/// Drives the cooperative tick loop: due cron jobs, quantized monitor sweeps,
/// and the heartbeat check.
pub struct SchedulerEngine {
    conn: Connection,
    delegate: Arc<dyn SchedulerDelegate>,
    tick_secs: u64,
    heartbeat_minutes: u64,
    monitor_hours: Vec<u32>,
}

impl SchedulerEngine {
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler engine started");
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(self.tick_secs.max(1)));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("scheduler tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn tick(&mut self) -> Result<()> {
        self.fire_due_crons().await?;
        self.maybe_sweep_monitor().await?;
        self.maybe_run_heartbeat().await?;
        Ok(())
    }

    async fn fire_due_crons(&mut self) -> Result<()> {
        let now = Utc::now();
        for job in cron_job::list_enabled(&self.conn)? {
            let tz = cron::parse_tz(job.timezone.as_deref());
            let seed = match chrono::DateTime::parse_from_rfc3339(job.seed_instant()) {
                Ok(dt) => dt.with_timezone(&Utc),
                Err(e) => {
                    warn!(job = %job.name, "bad seed timestamp, using now: {e}");
                    now
                }
            };
            let next = match cron::next_fire(&job.cron_expression, seed, tz) {
                Some(next) => next,
                None => {
                    warn!(job = %job.name, expr = %job.cron_expression, "bad or unsatisfiable cron expression, skipping");
                    continue;
                }
            };
            if next <= now {
                let session_name = if job.isolated {
                    format!("cron:{}", job.name)
                } else {
                    job.session_name.clone()
                };
                cron_job::record_run(&self.conn, &job.name, &now.to_rfc3339())?;
                info!(job = %job.name, %session_name, "firing cron job");
                let delegate = Arc::clone(&self.delegate);
                let prompt = job.prompt.clone();
                let job_name = job.name.clone();
                tokio::spawn(async move {
                    if let Err(e) = delegate.run_prompt(&session_name, &prompt).await {
                        error!(job = %job_name, "cron job execution failed: {e}");
                    }
                });
            }
        }
        Ok(())
    }

    async fn maybe_sweep_monitor(&mut self) -> Result<()> {
        let now = Utc::now();
        let hour = now.hour();
        if !self.monitor_hours.contains(&hour) {
            return Ok(());
        }
        if state::last_monitor_hour(&self.conn)? == Some(hour) {
            return Ok(());
        }
        state::set_last_monitor_hour(&self.conn, hour)?;
        info!(hour, "running monitor sweep");
        self.delegate.run_monitor_sweep().await;
        Ok(())
    }

    async fn maybe_run_heartbeat(&mut self) -> Result<()> {
        if self.heartbeat_minutes == 0 {
            return Ok(());
        }
        let now = Utc::now();
        if let Some(last) = state::last_heartbeat_at(&self.conn)? {
            if let Ok(last) = chrono::DateTime::parse_from_rfc3339(&last) {
                let elapsed = now.signed_duration_since(last.with_timezone(&Utc));
                if elapsed < chrono::Duration::minutes(self.heartbeat_minutes as i64) {
                    return Ok(());
                }
            }
        }

        let checks = heartbeat::list_enabled(&self.conn)?;
        let Some(prompt) = heartbeat::build_prompt(&checks) else {
            return Ok(());
        };
        state::set_last_heartbeat_at(&self.conn, &now.to_rfc3339())?;

        info!(checks = checks.len(), "running heartbeat");
        match self.delegate.run_prompt("_heartbeat", &prompt).await {
            Ok(response) if heartbeat::is_ok(&response) => {
                info!("heartbeat ok");
            }
            Ok(response) => {
                warn!("heartbeat reported a problem");
                self.delegate.post_to_default_chat(&response).await;
            }
            Err(e) => {
                error!("heartbeat run failed: {e}");
            }
        }
        Ok(())
    }
}
