use serde::{Deserialize, Serialize};

/// A single chat turn, append-only once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub session_name: String,
    pub role: MessageRole,
    pub content: String,
    pub summarized: bool,
    pub user_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(format!("unknown message role: {other}")),
        }
    }
}

/// A folded block of prior messages. Append-only; never edited once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub session_name: String,
    pub full_summary: String,
    pub short_summary: Option<String>,
    pub topics: Vec<String>,
    pub message_count: u32,
    pub is_milestone: bool,
    pub user_id: Option<String>,
    pub persona_name: Option<String>,
    pub created_at: String,
}

/// What kind of memory this is. No ranking between categories in this bridge —
/// that prioritization lived in the teacher's multi-user prompt budget, which
/// doesn't apply here; recall just renders every memory in one flat list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryCategory {
    Instruction,
    Preference,
    Fact,
    Context,
}

impl std::fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Instruction => write!(f, "instruction"),
            Self::Preference => write!(f, "preference"),
            Self::Fact => write!(f, "fact"),
            Self::Context => write!(f, "context"),
        }
    }
}

impl std::str::FromStr for MemoryCategory {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instruction" => Ok(Self::Instruction),
            "preference" => Ok(Self::Preference),
            "fact" => Ok(Self::Fact),
            "context" => Ok(Self::Context),
            other => Err(format!("unknown memory category: {other}")),
        }
    }
}

/// `(user_id?, category, key)` is unique; upserted by `learn`, removable by `forget`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: i64,
    pub user_id: Option<String>,
    pub category: MemoryCategory,
    pub key: String,
    pub content: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
}

/// A reusable system-prompt + tool configuration. At most one may have
/// `is_default = true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub system_prompt: Option<String>,
    pub mcp_servers: Vec<String>,
    pub skills: Vec<String>,
    pub config: Option<serde_json::Value>,
    pub is_default: bool,
}

/// Output of the Recall Builder — everything the Turn Engine needs to prime
/// an agent invocation for a given session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecallResult {
    pub context: Option<String>,
    pub persona_mcp_servers: Vec<String>,
    pub persona_skills: Vec<String>,
}

/// One turn's accounting, as persisted by `MemoryManager::record_usage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: i64,
    pub session_name: String,
    pub user_id: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub duration_ms: u64,
    pub num_turns: u32,
    pub created_at: String,
}

/// Aggregate usage totals across a set of records.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageTotals {
    pub num_turns: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

/// A bearer token granting dashboard HTTP API access. `token_hash` is the
/// SHA-256 hash of the plaintext token — the plaintext is shown to the
/// caller exactly once, at mint time, and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardToken {
    pub id: i64,
    pub label: String,
    pub enabled: bool,
    pub created_at: String,
    pub last_used_at: Option<String>,
}
