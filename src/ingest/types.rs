// src/ingest/types.rs
use anyhow::Result;

use crate::model::{Item, TopicDefinition};

/// A source-specific fetcher. Implementations swallow failures of individual
/// sub-requests (one subreddit, one story) and only return `Err` when the whole
/// provider cannot run. Returned items are unsaved; `fetch_all` persists them.
#[async_trait::async_trait]
pub trait NewsProvider: Send + Sync {
    async fn fetch_for_topic(&self, topic: &TopicDefinition) -> Result<Vec<Item>>;
    /// Provider kind, also used as `Item::source_kind`.
    fn name(&self) -> &'static str;
}
