use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Company,
    Person,
    Organization,
    Product,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Person => "person",
            Self::Organization => "organization",
            Self::Product => "product",
        }
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "company" => Ok(Self::Company),
            "person" => Ok(Self::Person),
            "organization" => Ok(Self::Organization),
            "product" => Ok(Self::Product),
            other => Err(format!("unknown entity_type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Blog,
    Repo,
    Pricing,
    Jobs,
    Changelog,
    Deals,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blog => "blog",
            Self::Repo => "repo",
            Self::Pricing => "pricing",
            Self::Jobs => "jobs",
            Self::Changelog => "changelog",
            Self::Deals => "deals",
        }
    }
}

impl std::str::FromStr for ResourceType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blog" => Ok(Self::Blog),
            "repo" => Ok(Self::Repo),
            "pricing" => Ok(Self::Pricing),
            "jobs" => Ok(Self::Jobs),
            "changelog" => Ok(Self::Changelog),
            "deals" => Ok(Self::Deals),
            other => Err(format!("unknown resource_type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    NewPost,
    PriceChange,
    NewRelease,
    NewJob,
    NewDeal,
    ContentUpdate,
    NewFeature,
    Baseline,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewPost => "new_post",
            Self::PriceChange => "price_change",
            Self::NewRelease => "new_release",
            Self::NewJob => "new_job",
            Self::NewDeal => "new_deal",
            Self::ContentUpdate => "content_update",
            Self::NewFeature => "new_feature",
            Self::Baseline => "baseline",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::NewPost => "\u{1F4DD}",
            Self::PriceChange => "\u{1F4B0}",
            Self::NewRelease => "\u{1F504}",
            Self::NewJob => "\u{1F465}",
            Self::NewDeal => "\u{1F91D}",
            Self::ContentUpdate => "\u{1F4C4}",
            Self::NewFeature => "\u{2728}",
            Self::Baseline => "\u{1F4CB}",
        }
    }
}

impl std::str::FromStr for ChangeType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new_post" => Ok(Self::NewPost),
            "price_change" => Ok(Self::PriceChange),
            "new_release" => Ok(Self::NewRelease),
            "new_job" => Ok(Self::NewJob),
            "new_deal" => Ok(Self::NewDeal),
            "content_update" => Ok(Self::ContentUpdate),
            "new_feature" => Ok(Self::NewFeature),
            "baseline" => Ok(Self::Baseline),
            other => Err(format!("unknown change_type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Telegram,
    Slack,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Slack => "slack",
        }
    }
}

impl std::str::FromStr for ChannelType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "telegram" => Ok(Self::Telegram),
            "slack" => Ok(Self::Slack),
            other => Err(format!("unknown channel_type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorTopic {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorEntity {
    pub id: i64,
    pub topic_id: i64,
    pub name: String,
    pub url: String,
    pub entity_type: EntityType,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorResource {
    pub id: i64,
    pub entity_id: i64,
    pub topic_id: i64,
    pub name: String,
    pub url: String,
    pub resource_type: ResourceType,
    pub last_checked_at: Option<String>,
    pub last_changed_at: Option<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub id: i64,
    pub resource_id: i64,
    pub content_hash: String,
    pub content_markdown: String,
    pub has_changes: bool,
    pub fetched_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorDigest {
    pub id: i64,
    pub topic_id: i64,
    pub entity_id: i64,
    pub resource_id: i64,
    pub snapshot_id: i64,
    pub summary: String,
    pub change_type: ChangeType,
    pub created_at: String,
}

/// `channel_config` holds either a chat id (Telegram) or a webhook URL (Slack),
/// stored as opaque JSON so the two channel types don't need separate columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSubscriber {
    pub id: i64,
    pub channel_type: ChannelType,
    pub channel_config: serde_json::Value,
    pub topic_id: Option<i64>,
    pub entity_id: Option<i64>,
    pub resource_id: Option<i64>,
    pub enabled: bool,
}

/// Activity/momentum metrics for an entity, computed by scanning its latest
/// snapshots for stars, commits, releases, and blog publication dates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MomentumMetrics {
    pub github_stars: u64,
    pub recent_commits: u64,
    pub releases: Vec<ReleaseInfo>,
    pub blog_dates: Vec<String>,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub name: String,
    pub date: String,
}
