// src/ingest/providers/hackernews.rs
use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use metrics::counter;
use serde::Deserialize;

use crate::ingest::types::NewsProvider;
use crate::ingest::{is_recent, normalize_title, KeywordMatcher};
use crate::model::{Item, TopicDefinition};

pub const HN_API_BASE: &str = "https://hacker-news.firebaseio.com/v0";
const KIND: &str = "hackernews";
const LABEL: &str = "Hacker News";
const LIST_LIMIT: usize = 100;
const ITEM_CONCURRENCY: usize = 8;

/// Topic source name → Firebase list endpoint.
const LISTS: [(&str, &str); 3] = [
    ("top", "topstories"),
    ("new", "newstories"),
    ("best", "beststories"),
];

#[derive(Debug, Deserialize)]
struct Story {
    id: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    score: Option<i64>,
    #[serde(default)]
    time: i64,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    dead: bool,
}

/// Stories from the public Firebase API. Keyword-only: a story that matches
/// no topic keyword is never returned.
pub struct HackerNewsProvider {
    http: reqwest::Client,
    base_url: String,
}

impl HackerNewsProvider {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: HN_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into().trim_end_matches('/').to_string();
        self
    }

    async fn fetch_ids(&self, endpoint: &str) -> Result<Vec<u64>> {
        let url = format!("{}/{endpoint}.json", self.base_url);
        let ids: Vec<u64> = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("hn get {endpoint}"))?
            .error_for_status()
            .with_context(|| format!("hn {endpoint} non-2xx"))?
            .json()
            .await
            .with_context(|| format!("hn {endpoint} json"))?;
        Ok(ids)
    }

    async fn fetch_story(&self, id: u64) -> Result<Option<Story>> {
        let url = format!("{}/item/{id}.json", self.base_url);
        let story: Option<Story> = self
            .http
            .get(&url)
            .send()
            .await
            .context("hn get item")?
            .error_for_status()
            .context("hn item non-2xx")?
            .json()
            .await
            .context("hn item json")?;
        Ok(story)
    }

    fn to_item(&self, story: Story, matcher: &KeywordMatcher, now: i64) -> Option<Item> {
        if story.deleted || story.dead || !is_recent(story.time, now) {
            return None;
        }
        let title = normalize_title(story.title.as_deref().unwrap_or_default());
        if title.is_empty() {
            return None;
        }
        let matched = matcher.find(&title);
        if matched.is_empty() {
            return None;
        }
        let url = story
            .url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| format!("https://news.ycombinator.com/item?id={}", story.id));
        Some(Item {
            id: None,
            title,
            url,
            source: LABEL.to_string(),
            source_kind: KIND.to_string(),
            score: story.score.unwrap_or(0).max(0) as u64,
            matched_keywords: matched,
            created_at: story.time,
        })
    }
}

#[async_trait]
impl NewsProvider for HackerNewsProvider {
    async fn fetch_for_topic(&self, topic: &TopicDefinition) -> Result<Vec<Item>> {
        let sources = topic.sources_for(KIND);
        if sources.is_empty() {
            tracing::info!(topic = %topic.name, provider = KIND, "no sources configured");
            return Ok(Vec::new());
        }

        let mut ids: Vec<u64> = Vec::new();
        for (source, endpoint) in LISTS {
            if !sources.iter().any(|s| s.eq_ignore_ascii_case(source)) {
                continue;
            }
            match self.fetch_ids(endpoint).await {
                Ok(list) => ids.extend(list.into_iter().take(LIST_LIMIT)),
                Err(e) => {
                    tracing::warn!(error = ?e, list = endpoint, "hn list fetch failed");
                    counter!("digest_provider_errors_total", "provider" => KIND).increment(1);
                }
            }
        }
        let mut seen = HashSet::new();
        ids.retain(|id| seen.insert(*id));

        let matcher = KeywordMatcher::new(&topic.keywords);
        let now = chrono::Utc::now().timestamp();

        let stories: Vec<(u64, Result<Option<Story>>)> = stream::iter(ids)
            .map(|id| async move { (id, self.fetch_story(id).await) })
            .buffered(ITEM_CONCURRENCY)
            .collect()
            .await;

        let mut items = Vec::new();
        for (id, res) in stories {
            match res {
                Ok(Some(story)) => items.extend(self.to_item(story, &matcher, now)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = ?e, story = id, "hn story fetch failed");
                    counter!("digest_provider_errors_total", "provider" => KIND).increment(1);
                }
            }
        }
        tracing::info!(topic = %topic.name, count = items.len(), "hn stories matched");

        Ok(items)
    }

    fn name(&self) -> &'static str {
        KIND
    }
}
