// src/source/types.rs
use serde::{Deserialize, Serialize};

/// Returned by `fetch_max_id` when the source could not be read.
pub const MAX_ID_UNKNOWN: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Story,
    Comment,
    Poll,
    Job,
    PollOpt,
    #[serde(other)]
    Other,
}

/// One record from the item endpoint. Every field except `id` may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: Option<ItemKind>,
    #[serde(default)]
    pub by: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// unix seconds
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub descendants: Option<i64>,
    #[serde(default)]
    pub deleted: Option<bool>,
    #[serde(default)]
    pub dead: Option<bool>,
    #[serde(default)]
    pub parent: Option<i64>,
    #[serde(default)]
    pub kids: Option<Vec<i64>>,
    #[serde(default)]
    pub poll: Option<i64>,
    #[serde(default)]
    pub parts: Option<Vec<i64>>,
}

impl Item {
    /// Convenience constructor, mostly for fakes and tests.
    pub fn story(id: i64, title: &str) -> Self {
        Self {
            id,
            kind: Some(ItemKind::Story),
            title: Some(title.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    /// unix seconds
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub karma: Option<i64>,
}

/// The record exists but its body could not be decoded. Retrying will not help.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedItem {
    pub reason: String,
}

impl MalformedItem {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for MalformedItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed item record: {}", self.reason)
    }
}

impl std::error::Error for MalformedItem {}

#[async_trait::async_trait]
pub trait ItemSource: Send + Sync {
    /// Highest ID the source currently knows, or [`MAX_ID_UNKNOWN`].
    async fn fetch_max_id(&self) -> i64;

    /// `Ok(None)` means the ID is a hole, which is expected. An undecodable
    /// body is reported as an error wrapping [`MalformedItem`].
    async fn fetch_item(&self, id: i64) -> anyhow::Result<Option<Item>>;

    /// Best-effort lookup used only for display.
    async fn fetch_user(&self, handle: &str) -> Option<UserSummary>;

    fn name(&self) -> &'static str;
}
