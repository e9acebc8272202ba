//! Turn Engine, Agent Invoker, Action Executor and Tool-use status lines —
//! everything needed to run one user→agent→reply cycle over an abstract
//! [`Transport`], independent of any concrete chat platform.

pub mod actions;
pub mod error;
pub mod invoker;
pub mod tool_status;
pub mod transport;
pub mod turn;

pub use error::{AgentError, Result};
pub use invoker::{AgentEvent, AgentInvoker, ToolUseEvent, TurnRequest, TurnResult, TurnUsage};
pub use transport::{MessageHandle, Transport, TransportError};
pub use turn::{process_turn, BusySet, TurnContext, TurnUsageRecord};
