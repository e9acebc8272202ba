//! Top-level orchestration: the public surface the rest of the bridge calls
//! into for topic/entity/resource management, sweeps, baselines, reports,
//! and subscriber administration.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{info, instrument, warn};

use crate::check;
use crate::db;
use crate::delegate::MonitorDelegate;
use crate::digest;
use crate::entity;
use crate::error::Result;
use crate::notify;
use crate::report;
use crate::resource;
use crate::subscriber;
use crate::topic;
use crate::types::{
    ChannelType, EntityType, MonitorDigest, MonitorEntity, MonitorResource, MonitorSubscriber, MonitorTopic, ResourceType,
};

/// Owns the monitor store and fronts every operation the rest of the bridge
/// needs. CRUD runs against a single held connection; sweep/report/baseline
/// operations span `.await` points internally, so each opens its own short-
/// lived connection to the same database file rather than holding the CRUD
/// lock across an await (the same split `SchedulerHandle` uses between its
/// `crud_conn` and the engine's own connection).
pub struct MonitorManager {
    db_path: PathBuf,
    crud_conn: Mutex<Connection>,
    delegate: Arc<dyn MonitorDelegate>,
    reports_dir: PathBuf,
}

impl MonitorManager {
    pub fn open(db_path: impl Into<PathBuf>, delegate: Arc<dyn MonitorDelegate>, reports_dir: PathBuf) -> Result<Self> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path)?;
        db::init_db(&conn)?;
        Ok(Self { db_path, crud_conn: Mutex::new(conn), delegate, reports_dir })
    }

    fn open_conn(&self) -> Result<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }

    // -- topic CRUD -----------------------------------------------------------

    pub fn create_topic(&self, name: &str, description: Option<&str>) -> Result<MonitorTopic> {
        topic::create(&self.crud_conn.lock().unwrap(), name, description)
    }

    pub fn list_topics(&self) -> Result<Vec<MonitorTopic>> {
        topic::list(&self.crud_conn.lock().unwrap())
    }

    pub fn delete_topic(&self, name: &str) -> Result<()> {
        topic::delete(&self.crud_conn.lock().unwrap(), name)
    }

    // -- entity CRUD ------------------------------------------------------------

    pub fn create_entity(&self, topic_name: &str, name: &str, url: &str, entity_type: EntityType) -> Result<MonitorEntity> {
        let conn = self.crud_conn.lock().unwrap();
        let t = topic::require_by_name(&conn, topic_name)?;
        entity::create(&conn, t.id, name, url, entity_type)
    }

    pub fn list_entities(&self, topic_name: Option<&str>) -> Result<Vec<MonitorEntity>> {
        let conn = self.crud_conn.lock().unwrap();
        let topic_id = topic_name.map(|n| topic::require_by_name(&conn, n)).transpose()?.map(|t| t.id);
        entity::list(&conn, topic_id)
    }

    pub fn delete_entity(&self, name: &str) -> Result<()> {
        entity::delete(&self.crud_conn.lock().unwrap(), name)
    }

    // -- resource CRUD ----------------------------------------------------------

    pub fn create_resource(&self, entity_name: &str, name: &str, url: &str, resource_type: ResourceType) -> Result<MonitorResource> {
        let conn = self.crud_conn.lock().unwrap();
        let e = entity::require_by_name(&conn, entity_name)?;
        resource::create(&conn, e.id, e.topic_id, name, url, resource_type)
    }

    pub fn list_resources(&self, topic_name: Option<&str>, entity_name: Option<&str>, enabled_only: bool) -> Result<Vec<MonitorResource>> {
        let conn = self.crud_conn.lock().unwrap();
        let topic_id = topic_name.map(|n| topic::require_by_name(&conn, n)).transpose()?.map(|t| t.id);
        let entity_id = entity_name.map(|n| entity::require_by_name(&conn, n)).transpose()?.map(|e| e.id);
        resource::list(&conn, topic_id, entity_id, enabled_only)
    }

    pub fn set_resource_enabled(&self, id: i64, enabled: bool) -> Result<()> {
        resource::set_enabled(&self.crud_conn.lock().unwrap(), id, enabled)
    }

    pub fn delete_resource(&self, id: i64) -> Result<()> {
        resource::delete(&self.crud_conn.lock().unwrap(), id)
    }

    // -- subscribers --------------------------------------------------------------

    pub fn subscribe(
        &self,
        channel_type: ChannelType,
        channel_config: serde_json::Value,
        topic_id: Option<i64>,
        entity_id: Option<i64>,
        resource_id: Option<i64>,
    ) -> Result<MonitorSubscriber> {
        subscriber::create(&self.crud_conn.lock().unwrap(), channel_type, &channel_config, topic_id, entity_id, resource_id)
    }

    pub fn list_subscribers(&self) -> Result<Vec<MonitorSubscriber>> {
        subscriber::list(&self.crud_conn.lock().unwrap())
    }

    pub fn unsubscribe(&self, id: i64) -> Result<()> {
        subscriber::delete(&self.crud_conn.lock().unwrap(), id)
    }

    pub fn list_digests(&self, topic_name: Option<&str>, entity_name: Option<&str>, limit: usize) -> Result<Vec<MonitorDigest>> {
        let conn = self.crud_conn.lock().unwrap();
        let topic_id = topic_name.map(|n| topic::require_by_name(&conn, n)).transpose()?.map(|t| t.id);
        let entity_id = entity_name.map(|n| entity::require_by_name(&conn, n)).transpose()?.map(|e| e.id);
        digest::list(&conn, topic_id, entity_id, limit)
    }

    // -- sweeps, baselines, reports -------------------------------------------------

    /// Check a filtered set of resources, summarize changes through the
    /// Agent, and record digests.
    #[instrument(skip(self))]
    pub async fn run_check(&self, topic_name: Option<&str>, entity_name: Option<&str>) -> Result<Vec<MonitorDigest>> {
        let resources = self.list_resources(topic_name, entity_name, true)?;
        let conn = self.open_conn()?;
        check::run_check(&conn, &self.delegate, &resources).await
    }

    #[instrument(skip(self))]
    pub async fn generate_baseline_digests(&self, topic_name: Option<&str>) -> Result<Vec<MonitorDigest>> {
        let resources = self.list_resources(topic_name, None, true)?;
        let conn = self.open_conn()?;
        check::run_baseline_digests(&conn, &self.delegate, &resources).await
    }

    #[instrument(skip(self))]
    pub async fn generate_report(&self, topic_name: Option<&str>) -> Result<String> {
        let conn = self.open_conn()?;
        report::generate_report(&conn, &self.delegate, &self.reports_dir, topic_name).await
    }

    /// Scheduler hook: sweep every enabled resource across every topic,
    /// notify subscribers, and post a summary digest to the default chat.
    #[instrument(skip(self))]
    pub async fn run_full_sweep(&self) {
        let resources = match self.list_resources(None, None, true) {
            Ok(r) => r,
            Err(e) => {
                warn!("failed to list resources for monitor sweep: {e}");
                return;
            }
        };
        if resources.is_empty() {
            return;
        }

        let conn = match self.open_conn() {
            Ok(c) => c,
            Err(e) => {
                warn!("failed to open monitor db for sweep: {e}");
                return;
            }
        };

        let digests = match check::run_check(&conn, &self.delegate, &resources).await {
            Ok(d) => d,
            Err(e) => {
                warn!("monitor sweep check failed: {e}");
                return;
            }
        };

        if let Err(e) = notify::notify_subscribers(&conn, &self.delegate, &digests, "Sweep").await {
            warn!("subscriber notification failed: {e}");
        }

        let summary = if digests.is_empty() {
            "\u{1F50D} Monitor sweep: no changes detected.".to_string()
        } else {
            format!("\u{1F50D} Monitor sweep: {} change(s) found across {} resource(s).", digests.len(), resources.len())
        };
        self.delegate.post_to_default_chat(&summary).await;
        info!(changes = digests.len(), resources = resources.len(), "monitor sweep complete");
    }
}
