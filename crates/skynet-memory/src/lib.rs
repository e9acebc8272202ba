pub mod db;
pub mod error;
pub mod manager;
pub mod memory;
pub mod message;
pub mod persona;
pub mod recall;
pub mod summarizer;
pub mod summary;
pub mod types;
pub mod usage;

pub use error::MemoryError;
pub use manager::MemoryManager;
pub use types::{
    ConversationSummary, DashboardToken, Memory, MemoryCategory, Message, MessageRole, Persona, RecallResult,
    UsageRecord, UsageTotals,
};
