use serde::{Deserialize, Serialize};

/// `default` leaves permission prompts in place; `acceptEdits` auto-accepts file
/// edits; `bypassPermissions` skips the agent's permission system entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    Default,
    AcceptEdits,
    BypassPermissions,
}

impl Default for PermissionMode {
    fn default() -> Self {
        Self::Default
    }
}

/// How much of the agent's reasoning to surface and budget for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingMode {
    Adaptive,
    Enabled,
    Disabled,
}

impl Default for ThinkingMode {
    fn default() -> Self {
        Self::Adaptive
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffortLevel {
    Low,
    Medium,
    High,
    Max,
}

/// A named conversation slot. Lazily created on first use, or explicitly via
/// `create`; mutated only by the single principal this bridge answers to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub name: String,
    /// Resumption token handed back by the agent CLI after its first reply in
    /// this session; `None` until the first successful turn.
    #[serde(default)]
    pub agent_thread_id: Option<String>,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub permission_mode: PermissionMode,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub thinking_mode: ThinkingMode,
    #[serde(default)]
    pub thinking_budget_tokens: Option<u32>,
    #[serde(default)]
    pub effort_level: Option<EffortLevel>,
    #[serde(default)]
    pub max_turns: Option<u32>,
    #[serde(default)]
    pub max_budget_usd: Option<f64>,
    pub cwd: String,
    #[serde(default)]
    pub extra_dirs: Vec<String>,
    pub created_at: String,
    pub last_used_at: String,
}

impl Session {
    pub fn new(name: impl Into<String>, cwd: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            name: name.into(),
            agent_thread_id: None,
            streaming: false,
            permission_mode: PermissionMode::default(),
            model_id: None,
            thinking_mode: ThinkingMode::default(),
            thinking_budget_tokens: None,
            effort_level: None,
            max_turns: None,
            max_budget_usd: None,
            cwd,
            extra_dirs: Vec::new(),
            created_at: now.clone(),
            last_used_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_used_at = chrono::Utc::now().to_rfc3339();
    }
}

/// The whole registry, exactly as it is flushed to `sessions.json`.
///
/// Field additions to `Session` must stay forward-compatible — unknown keys
/// are ignored by serde, missing keys fall back to `#[serde(default)]` — so
/// an older `sessions.json` loads cleanly after a schema change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryDocument {
    pub active_session: Option<String>,
    pub sessions: std::collections::HashMap<String, Session>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_has_matching_timestamps() {
        let s = Session::new("main", "/home/user".to_string());
        assert_eq!(s.created_at, s.last_used_at);
        assert!(s.agent_thread_id.is_none());
    }

    #[test]
    fn touch_advances_last_used_at() {
        let mut s = Session::new("main", "/home/user".to_string());
        let created = s.created_at.clone();
        s.touch();
        assert_eq!(s.created_at, created);
    }

    #[test]
    fn registry_document_roundtrips_through_json() {
        let mut doc = RegistryDocument::default();
        doc.active_session = Some("main".to_string());
        doc.sessions
            .insert("main".to_string(), Session::new("main", "/tmp".to_string()));
        let encoded = serde_json::to_string(&doc).unwrap();
        let decoded: RegistryDocument = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.active_session, Some("main".to_string()));
        assert!(decoded.sessions.contains_key("main"));
    }
}
