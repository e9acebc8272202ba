use std::sync::Mutex;

use rusqlite::Connection;
use tracing::instrument;

use crate::error::Result;
use crate::summarizer;
use crate::types::{ConversationSummary, Memory, MemoryCategory, Message, MessageRole, Persona, RecallResult};
use crate::{db, memory, message, persona, recall, summary, usage};

/// Owns the single SQLite connection backing messages, summaries, memory and
/// personas. A `Mutex` is sufficient at this scale — see `skynet-sessions`
/// and `skynet-scheduler` for the same choice.
pub struct MemoryManager {
    db: Mutex<Connection>,
}

impl MemoryManager {
    pub fn new(conn: Connection) -> Result<Self> {
        db::init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    // -- messages --------------------------------------------------------

    #[instrument(skip(self, content), fields(session_name))]
    pub fn log_message(
        &self,
        session_name: &str,
        role: MessageRole,
        content: &str,
        user_id: Option<&str>,
    ) -> Result<Message> {
        let db = self.db.lock().unwrap();
        message::append(&db, session_name, role, content, user_id)
    }

    pub fn recent_messages(&self, session_name: &str, limit: usize) -> Result<Vec<Message>> {
        let db = self.db.lock().unwrap();
        message::recent(&db, session_name, limit)
    }

    pub fn search_messages(
        &self,
        session_name: Option<&str>,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let db = self.db.lock().unwrap();
        message::search(&db, session_name, query, limit)
    }

    // -- summarizer --------------------------------------------------------

    /// Whether this session has accumulated enough unsummarized messages to
    /// trigger a background summarization pass.
    pub fn needs_summary(&self, session_name: &str, threshold: usize) -> Result<bool> {
        let db = self.db.lock().unwrap();
        Ok(message::count_unsummarized(&db, session_name)? >= threshold)
    }

    /// Load the unsummarized messages for a session and render the prompt to
    /// send to a fresh, isolated agent session. Returns `None` if there is
    /// nothing to summarize.
    pub fn build_summarize_prompt(&self, session_name: &str) -> Result<Option<(Vec<i64>, String)>> {
        let db = self.db.lock().unwrap();
        let messages = message::unsummarized(&db, session_name)?;
        if messages.is_empty() {
            return Ok(None);
        }
        let ids = messages.iter().map(|m| m.id).collect();
        let transcript = summarizer::format_transcript(&messages);
        Ok(Some((ids, summarizer::summarize_prompt(&transcript))))
    }

    /// Parse the agent's raw summarization output and, in one transaction,
    /// insert the summary and mark every folded message as summarized.
    ///
    /// Called with the message ids returned by `build_summarize_prompt` for
    /// the same session — if that set changed in between (shouldn't happen,
    /// since summarization runs synchronously per session) the extra ids are
    /// marked too, which is harmless.
    #[instrument(skip(self, raw_agent_output), fields(session_name))]
    pub fn apply_summary(
        &self,
        session_name: &str,
        raw_agent_output: &str,
        message_ids: &[i64],
        user_id: Option<&str>,
    ) -> Result<ConversationSummary> {
        let (short, full) = summarizer::parse_summary(raw_agent_output);
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let id = summary::insert(
            &tx,
            session_name,
            &full,
            Some(&short),
            &[],
            message_ids.len() as u32,
            false,
            user_id,
            None,
        )?;
        message::mark_summarized(&tx, message_ids)?;
        tx.commit()?;
        drop(db);

        let db = self.db.lock().unwrap();
        summary::recent(&db, session_name, 1)?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or(crate::error::MemoryError::SummaryNotFound(session_name.to_string()))
    }

    pub fn recent_summaries(&self, session_name: &str, limit: usize) -> Result<Vec<ConversationSummary>> {
        let db = self.db.lock().unwrap();
        summary::recent(&db, session_name, limit)
    }

    pub fn milestone_summaries(&self, session_name: &str, limit: usize) -> Result<Vec<ConversationSummary>> {
        let db = self.db.lock().unwrap();
        summary::milestones(&db, session_name, limit)
    }

    pub fn search_summaries(&self, query: &str, limit: usize) -> Result<Vec<ConversationSummary>> {
        let db = self.db.lock().unwrap();
        summary::search(&db, query, limit)
    }

    // -- memory ------------------------------------------------------------

    pub fn learn(
        &self,
        user_id: Option<&str>,
        category: MemoryCategory,
        key: &str,
        content: &str,
        metadata: Option<&serde_json::Value>,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        memory::learn(&db, user_id, category, key, content, metadata)
    }

    pub fn forget(&self, user_id: Option<&str>, category: MemoryCategory, key: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        memory::forget(&db, user_id, category, key)
    }

    pub fn get_memory(&self, user_id: Option<&str>, category: MemoryCategory, key: &str) -> Result<Option<Memory>> {
        let db = self.db.lock().unwrap();
        memory::get(&db, user_id, category, key)
    }

    pub fn list_memories(&self, user_id: Option<&str>, limit: usize) -> Result<Vec<Memory>> {
        let db = self.db.lock().unwrap();
        memory::list(&db, user_id, limit)
    }

    // -- personas ------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn create_persona(
        &self,
        name: &str,
        description: Option<&str>,
        system_prompt: Option<&str>,
        mcp_servers: &[String],
        skills: &[String],
        config: Option<&serde_json::Value>,
    ) -> Result<Persona> {
        let db = self.db.lock().unwrap();
        persona::create(&db, name, description, system_prompt, mcp_servers, skills, config)
    }

    pub fn get_persona(&self, name: &str) -> Result<Option<Persona>> {
        let db = self.db.lock().unwrap();
        persona::get(&db, name)
    }

    pub fn list_personas(&self) -> Result<Vec<Persona>> {
        let db = self.db.lock().unwrap();
        persona::list(&db)
    }

    pub fn default_persona(&self) -> Result<Option<Persona>> {
        let db = self.db.lock().unwrap();
        persona::default_persona(&db)
    }

    pub fn set_default_persona(&self, name: &str) -> Result<()> {
        let mut db = self.db.lock().unwrap();
        persona::set_default(&mut db, name)
    }

    pub fn update_persona_prompt(&self, name: &str, system_prompt: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        persona::update_prompt(&db, name, system_prompt)
    }

    pub fn update_persona_mcp_servers(&self, name: &str, mcp_servers: &[String]) -> Result<()> {
        let db = self.db.lock().unwrap();
        persona::update_mcp_servers(&db, name, mcp_servers)
    }

    pub fn update_persona_skills(&self, name: &str, skills: &[String]) -> Result<()> {
        let db = self.db.lock().unwrap();
        persona::update_skills(&db, name, skills)
    }

    pub fn delete_persona(&self, name: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        persona::delete(&db, name)
    }

    // -- recall --------------------------------------------------------------

    #[instrument(skip(self), fields(session_name))]
    pub fn build_recall_context(&self, session_name: &str, user_id: Option<&str>) -> RecallResult {
        let db = self.db.lock().unwrap();
        recall::build_recall_context(&db, session_name, user_id)
    }

    // -- usage accounting ------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn record_usage(
        &self,
        session_name: &str,
        user_id: Option<&str>,
        input_tokens: u32,
        output_tokens: u32,
        cost_usd: f64,
        duration_ms: u64,
        num_turns: u32,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        usage::record(&db, session_name, user_id, input_tokens, output_tokens, cost_usd, duration_ms, num_turns)
    }

    pub fn usage_totals(&self, session_name: Option<&str>) -> Result<crate::types::UsageTotals> {
        let db = self.db.lock().unwrap();
        usage::totals(&db, session_name)
    }

    pub fn usage_records(&self, session_name: Option<&str>, limit: usize) -> Result<Vec<crate::types::UsageRecord>> {
        let db = self.db.lock().unwrap();
        usage::list_records(&db, session_name, limit)
    }

    // -- dashboard tokens -------------------------------------------------

    pub fn create_dashboard_token(&self, label: &str, token_hash: &str) -> Result<crate::types::DashboardToken> {
        let db = self.db.lock().unwrap();
        usage::create_token(&db, label, token_hash)
    }

    pub fn list_dashboard_tokens(&self) -> Result<Vec<crate::types::DashboardToken>> {
        let db = self.db.lock().unwrap();
        usage::list_tokens(&db)
    }

    pub fn revoke_dashboard_token(&self, token_hash: &str) -> Result<bool> {
        let db = self.db.lock().unwrap();
        usage::revoke_token(&db, token_hash)
    }

    pub fn verify_dashboard_token(&self, token_hash: &str) -> Result<Option<crate::types::DashboardToken>> {
        let db = self.db.lock().unwrap();
        usage::verify_token(&db, token_hash)
    }
}
