// src/store/mod.rs
//! Collaborator contracts for topic lookup and persistence, plus the
//! implementations the binary and tests use.

pub mod memory;
pub mod topics;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{Digest, Item, TopicDefinition};

pub use memory::{MemoryStore, MemoryTopicStore};
pub use topics::TomlTopicStore;

#[async_trait]
pub trait TopicStore: Send + Sync {
    async fn get_topic_by_name(&self, name: &str) -> Result<Option<TopicDefinition>>;
    async fn list_topic_names(&self) -> Result<Vec<String>>;
}

/// Item persistence, used by `fetch_all` to make fetches idempotent.
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn find_by_url(&self, url: &str) -> Result<Option<Item>>;
    /// Returns the assigned id.
    async fn insert_item(&self, item: &Item) -> Result<i64>;
}

/// Digest persistence and source linking.
#[async_trait]
pub trait DigestStore: Send + Sync {
    /// Store the digest together with its source links, all or nothing.
    /// Returns the assigned id.
    async fn insert_digest(
        &self,
        topic: &str,
        markdown: &str,
        created_at: DateTime<Utc>,
        source_ids: &[i64],
    ) -> Result<i64>;
    async fn latest_digest(&self) -> Result<Option<Digest>>;
    async fn digest_by_id(&self, id: i64) -> Result<Option<Digest>>;
}
