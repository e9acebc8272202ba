//! Fetch → hash → diff → summarize → digest → notify pipeline over a
//! topic/entity/resource tree, plus baseline generation and report synthesis.

pub mod check;
pub mod db;
pub mod delegate;
pub mod digest;
pub mod entity;
pub mod error;
pub mod fetch;
pub mod manager;
pub mod momentum;
pub mod notify;
pub mod report;
pub mod resource;
pub mod snapshot;
pub mod subscriber;
pub mod topic;
pub mod types;
pub mod validation;

pub use delegate::MonitorDelegate;
pub use error::{MonitorError, Result};
pub use manager::MonitorManager;
pub use types::{
    ChangeType, ChannelType, EntityType, MonitorDigest, MonitorEntity, MonitorResource, MonitorSnapshot, MonitorSubscriber,
    MonitorTopic, ResourceType,
};
