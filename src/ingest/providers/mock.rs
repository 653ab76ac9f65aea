// src/ingest/providers/mock.rs
//! Offline stand-in for the Reddit provider (`USE_MOCK_DATA=true`).

use anyhow::Result;
use async_trait::async_trait;

use crate::ingest::types::NewsProvider;
use crate::ingest::{is_recent, KeywordMatcher};
use crate::model::{Item, TopicDefinition};

const KIND: &str = "reddit";

/// (title, subreddit, score, age in hours)
const FIXTURES: &[(&str, &str, u64, i64)] = &[
    ("Open-weights AI model tops coding benchmark", "MachineLearning", 1840, 3),
    ("Rust 1.90 released with faster incremental builds", "rust", 1220, 5),
    ("Researchers publish LLM evaluation suite for long context", "LocalLLaMA", 960, 8),
    ("AI chip export rules tightened again", "technology", 2310, 11),
    ("Show-and-tell: self-hosted photo search with CLIP", "selfhosted", 410, 14),
    ("Postgres 18 beta: async I/O lands", "programming", 780, 20),
    ("Weekly discussion thread", "MachineLearning", 55, 30),
];

/// Serves a fixed set of posts stamped relative to now, keyword-tagged the
/// same way the real provider does.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockRedditProvider;

impl MockRedditProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NewsProvider for MockRedditProvider {
    async fn fetch_for_topic(&self, topic: &TopicDefinition) -> Result<Vec<Item>> {
        let matcher = KeywordMatcher::new(&topic.keywords);
        let now = chrono::Utc::now().timestamp();
        let slug = topic.name.to_lowercase().replace(' ', "-");

        let items: Vec<Item> = FIXTURES
            .iter()
            .enumerate()
            .map(|(i, (title, sub, score, hours))| Item {
                id: None,
                title: title.to_string(),
                url: format!("https://reddit.com/r/{sub}/comments/mock{i}_{slug}/"),
                source: sub.to_string(),
                source_kind: KIND.to_string(),
                score: *score,
                matched_keywords: matcher.find(title),
                created_at: now - hours * 3600,
            })
            .filter(|it| is_recent(it.created_at, now))
            .collect();

        tracing::info!(topic = %topic.name, count = items.len(), "serving mock reddit posts");
        Ok(items)
    }

    fn name(&self) -> &'static str {
        KIND
    }
}
