use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, instrument, warn};

use crate::error::{Result, SessionError};
use crate::types::{RegistryDocument, Session};

/// In-memory registry state, mirrored 1:1 with the on-disk document.
struct RegistryState {
    active_session: Option<String>,
    sessions: HashMap<String, Session>,
}

impl From<RegistryDocument> for RegistryState {
    fn from(doc: RegistryDocument) -> Self {
        Self {
            active_session: doc.active_session,
            sessions: doc.sessions,
        }
    }
}

impl From<&RegistryState> for RegistryDocument {
    fn from(state: &RegistryState) -> Self {
        Self {
            active_session: state.active_session.clone(),
            sessions: state.sessions.clone(),
        }
    }
}

/// Owns the entire named-session registry behind one `Mutex`. There is
/// exactly one writer path — the Turn Engine and slash-command handlers all
/// go through this lock — so no further coordination is needed.
///
/// Every mutation flushes the whole registry to `sessions.json` via a
/// write-temp-then-rename sequence, so a crash mid-write never corrupts it.
pub struct SessionManager {
    path: PathBuf,
    state: Mutex<RegistryState>,
}

impl SessionManager {
    /// Load the registry from `path`. A missing file starts empty; a corrupt
    /// file is logged and also starts empty — this registry never fails to
    /// construct.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: PathBuf) -> Self {
        let state = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<RegistryDocument>(&raw) {
                Ok(doc) => RegistryState::from(doc),
                Err(err) => {
                    warn!(%err, "sessions.json is corrupt, starting with an empty registry");
                    RegistryState {
                        active_session: None,
                        sessions: HashMap::new(),
                    }
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("no sessions.json yet, starting with an empty registry");
                RegistryState {
                    active_session: None,
                    sessions: HashMap::new(),
                }
            }
            Err(err) => {
                warn!(%err, "failed to read sessions.json, starting with an empty registry");
                RegistryState {
                    active_session: None,
                    sessions: HashMap::new(),
                }
            }
        };

        Self {
            path,
            state: Mutex::new(state),
        }
    }

    #[instrument(skip(self), fields(name))]
    pub fn create(&self, name: &str, cwd: String) -> Result<Session> {
        let mut state = self.state.lock().unwrap();
        if state.sessions.contains_key(name) {
            return Err(SessionError::AlreadyExists(name.to_string()));
        }
        let session = Session::new(name, cwd);
        state.sessions.insert(name.to_string(), session.clone());
        state.active_session = Some(name.to_string());
        self.flush(&state)?;
        Ok(session)
    }

    #[instrument(skip(self), fields(name))]
    pub fn get(&self, name: &str) -> Option<Session> {
        self.state.lock().unwrap().sessions.get(name).cloned()
    }

    /// Delete a session. If it was active, the first remaining session (in
    /// arbitrary map order — there is no meaningful ordering once the active
    /// one is gone) is promoted; if none remain, `active_session` becomes
    /// `None`.
    #[instrument(skip(self), fields(name))]
    pub fn delete(&self, name: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.sessions.remove(name).is_none() {
            return Ok(false);
        }
        if state.active_session.as_deref() == Some(name) {
            state.active_session = state.sessions.keys().next().cloned();
        }
        self.flush(&state)?;
        Ok(true)
    }

    #[instrument(skip(self), fields(name))]
    pub fn switch(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.sessions.contains_key(name) {
            return Err(SessionError::NotFound(name.to_string()));
        }
        state.active_session = Some(name.to_string());
        self.flush(&state)?;
        Ok(())
    }

    #[instrument(skip(self), fields(old_name, new_name))]
    pub fn rename(&self, old_name: &str, new_name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.sessions.contains_key(old_name) {
            return Err(SessionError::NotFound(old_name.to_string()));
        }
        if state.sessions.contains_key(new_name) {
            return Err(SessionError::AlreadyExists(new_name.to_string()));
        }
        let mut session = state.sessions.remove(old_name).unwrap();
        session.name = new_name.to_string();
        state.sessions.insert(new_name.to_string(), session);
        if state.active_session.as_deref() == Some(old_name) {
            state.active_session = Some(new_name.to_string());
        }
        self.flush(&state)?;
        Ok(())
    }

    #[instrument(skip(self), fields(name, thread_id))]
    pub fn set_agent_thread(&self, name: &str, thread_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let session = state
            .sessions
            .get_mut(name)
            .ok_or_else(|| SessionError::NotFound(name.to_string()))?;
        session.agent_thread_id = Some(thread_id.to_string());
        session.touch();
        self.flush(&state)?;
        Ok(())
    }

    /// Record that a turn just ran in this session, without changing its
    /// resumption token.
    #[instrument(skip(self), fields(name))]
    pub fn touch(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let session = state
            .sessions
            .get_mut(name)
            .ok_or_else(|| SessionError::NotFound(name.to_string()))?;
        session.touch();
        self.flush(&state)?;
        Ok(())
    }

    /// Apply an arbitrary mutation to a session's fields, then touch and
    /// flush it. Used by the tuning commands (`/stream`, `/model`, `/think`,
    /// …) that each touch a different subset of `Session`.
    #[instrument(skip(self, f), fields(name))]
    pub fn update<F>(&self, name: &str, f: F) -> Result<Session>
    where
        F: FnOnce(&mut Session),
    {
        let mut state = self.state.lock().unwrap();
        let session = state
            .sessions
            .get_mut(name)
            .ok_or_else(|| SessionError::NotFound(name.to_string()))?;
        f(session);
        session.touch();
        let updated = session.clone();
        self.flush(&state)?;
        Ok(updated)
    }

    pub fn list_all(&self) -> Vec<Session> {
        let state = self.state.lock().unwrap();
        let mut sessions: Vec<Session> = state.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| a.name.cmp(&b.name));
        sessions
    }

    pub fn current(&self) -> Option<Session> {
        let state = self.state.lock().unwrap();
        state
            .active_session
            .as_ref()
            .and_then(|name| state.sessions.get(name).cloned())
    }

    pub fn active_name(&self) -> Option<String> {
        self.state.lock().unwrap().active_session.clone()
    }

    /// Serialize the full document and swap it into place atomically.
    fn flush(&self, state: &RegistryState) -> Result<()> {
        flush_to(&self.path, &RegistryDocument::from(state))
    }
}

fn flush_to(path: &Path, doc: &RegistryDocument) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(doc)?;
    let tmp_path = path.with_extension("json.tmp");
    {
        let mut tmp = std::fs::File::create(&tmp_path)?;
        tmp.write_all(&json)?;
        tmp.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("skynet-sessions-test-{name}-{}", std::process::id()));
        p.push("sessions.json");
        p
    }

    #[test]
    fn load_missing_file_starts_empty() {
        let path = temp_path("missing");
        let mgr = SessionManager::load(path);
        assert!(mgr.current().is_none());
        assert!(mgr.list_all().is_empty());
    }

    #[test]
    fn create_then_get_roundtrips() {
        let path = temp_path("create");
        let mgr = SessionManager::load(path);
        let created = mgr.create("main", "/tmp".to_string()).unwrap();
        let fetched = mgr.get("main").unwrap();
        assert_eq!(created.name, fetched.name);
        assert_eq!(mgr.active_name().as_deref(), Some("main"));
    }

    #[test]
    fn create_duplicate_fails() {
        let path = temp_path("dup");
        let mgr = SessionManager::load(path);
        mgr.create("main", "/tmp".to_string()).unwrap();
        assert!(matches!(
            mgr.create("main", "/tmp".to_string()),
            Err(SessionError::AlreadyExists(_))
        ));
    }

    #[test]
    fn delete_active_promotes_first_remaining() {
        let path = temp_path("delete-promote");
        let mgr = SessionManager::load(path);
        mgr.create("a", "/tmp".to_string()).unwrap();
        mgr.create("b", "/tmp".to_string()).unwrap();
        mgr.switch("a").unwrap();
        assert!(mgr.delete("a").unwrap());
        assert_eq!(mgr.active_name().as_deref(), Some("b"));
    }

    #[test]
    fn delete_last_session_clears_active() {
        let path = temp_path("delete-last");
        let mgr = SessionManager::load(path);
        mgr.create("only", "/tmp".to_string()).unwrap();
        assert!(mgr.delete("only").unwrap());
        assert!(mgr.active_name().is_none());
    }

    #[test]
    fn rename_fails_on_missing_source_or_existing_target() {
        let path = temp_path("rename");
        let mgr = SessionManager::load(path);
        mgr.create("a", "/tmp".to_string()).unwrap();
        mgr.create("b", "/tmp".to_string()).unwrap();
        assert!(matches!(
            mgr.rename("missing", "c"),
            Err(SessionError::NotFound(_))
        ));
        assert!(matches!(
            mgr.rename("a", "b"),
            Err(SessionError::AlreadyExists(_))
        ));
        mgr.rename("a", "c").unwrap();
        assert!(mgr.get("c").is_some());
        assert!(mgr.get("a").is_none());
    }

    #[test]
    fn update_mutates_and_touches() {
        let path = temp_path("update");
        let mgr = SessionManager::load(path);
        mgr.create("main", "/tmp".to_string()).unwrap();
        let before = mgr.get("main").unwrap().last_used_at;
        let updated = mgr.update("main", |s| s.streaming = true).unwrap();
        assert!(updated.streaming);
        assert!(mgr.get("main").unwrap().last_used_at >= before);
        assert!(matches!(mgr.update("missing", |s| s.streaming = true), Err(SessionError::NotFound(_))));
    }

    #[test]
    fn reload_survives_restart() {
        let path = temp_path("reload");
        {
            let mgr = SessionManager::load(path.clone());
            mgr.create("main", "/tmp".to_string()).unwrap();
        }
        let mgr = SessionManager::load(path);
        assert_eq!(mgr.active_name().as_deref(), Some("main"));
    }
}
