pub mod adapter;
pub mod commands;
pub mod context;
pub mod error;
pub mod handler;
pub mod markdown;
pub mod principal;
pub mod send;
pub mod transport;

pub use adapter::TelegramAdapter;
pub use context::{BridgeContext, DashboardToken, UsageSummary};
pub use error::TelegramError;
pub use transport::TelegramTransport;
