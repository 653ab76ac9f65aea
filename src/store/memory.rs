//! In-process stores. Ids are assigned sequentially from 1.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{DigestStore, ItemStore, TopicStore};
use crate::model::{Digest, Item, TopicDefinition};

#[derive(Debug, Clone)]
struct DigestRow {
    id: i64,
    topic: String,
    markdown: String,
    created_at: DateTime<Utc>,
    item_ids: Vec<i64>,
}

#[derive(Debug, Default)]
struct Tables {
    items: Vec<Item>,
    by_url: HashMap<String, usize>,
    digests: Vec<DigestRow>,
}

/// Items + digests kept behind one mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item_count(&self) -> usize {
        self.inner.lock().expect("store mutex poisoned").items.len()
    }

    pub fn digest_count(&self) -> usize {
        self.inner.lock().expect("store mutex poisoned").digests.len()
    }

    fn hydrate(t: &Tables, row: &DigestRow) -> Digest {
        let sources = row
            .item_ids
            .iter()
            .filter_map(|id| usize::try_from(*id - 1).ok())
            .filter_map(|i| t.items.get(i).cloned())
            .collect();
        Digest {
            id: row.id,
            topic: row.topic.clone(),
            markdown: row.markdown.clone(),
            created_at: row.created_at,
            sources,
        }
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn find_by_url(&self, url: &str) -> Result<Option<Item>> {
        let t = self.inner.lock().expect("store mutex poisoned");
        Ok(t.by_url.get(url).map(|&i| t.items[i].clone()))
    }

    async fn insert_item(&self, item: &Item) -> Result<i64> {
        let mut t = self.inner.lock().expect("store mutex poisoned");
        if t.by_url.contains_key(&item.url) {
            anyhow::bail!("duplicate url: {}", item.url);
        }
        let id = t.items.len() as i64 + 1;
        let mut row = item.clone();
        row.id = Some(id);
        let pos = t.items.len();
        t.by_url.insert(row.url.clone(), pos);
        t.items.push(row);
        Ok(id)
    }
}

#[async_trait]
impl DigestStore for MemoryStore {
    async fn insert_digest(
        &self,
        topic: &str,
        markdown: &str,
        created_at: DateTime<Utc>,
        source_ids: &[i64],
    ) -> Result<i64> {
        let mut t = self.inner.lock().expect("store mutex poisoned");
        if let Some(bad) = source_ids
            .iter()
            .find(|&&id| id < 1 || id as usize > t.items.len())
        {
            anyhow::bail!("unknown item id {bad}");
        }
        let id = t.digests.len() as i64 + 1;
        t.digests.push(DigestRow {
            id,
            topic: topic.to_string(),
            markdown: markdown.to_string(),
            created_at,
            item_ids: source_ids.to_vec(),
        });
        Ok(id)
    }

    async fn latest_digest(&self) -> Result<Option<Digest>> {
        let t = self.inner.lock().expect("store mutex poisoned");
        Ok(t.digests.last().map(|row| Self::hydrate(&t, row)))
    }

    async fn digest_by_id(&self, id: i64) -> Result<Option<Digest>> {
        let t = self.inner.lock().expect("store mutex poisoned");
        Ok(t.digests
            .iter()
            .find(|d| d.id == id)
            .map(|row| Self::hydrate(&t, row)))
    }
}

/// Fixed topic set, mostly for tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryTopicStore {
    topics: Vec<TopicDefinition>,
}

impl MemoryTopicStore {
    pub fn new(topics: Vec<TopicDefinition>) -> Self {
        Self { topics }
    }
}

#[async_trait]
impl TopicStore for MemoryTopicStore {
    async fn get_topic_by_name(&self, name: &str) -> Result<Option<TopicDefinition>> {
        Ok(self.topics.iter().find(|t| t.name == name).cloned())
    }

    async fn list_topic_names(&self) -> Result<Vec<String>> {
        Ok(self.topics.iter().map(|t| t.name.clone()).collect())
    }
}
