// src/model.rs
//! Transient data passed between providers, the selector and the collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fallback bucket for items whose provider did not tag them.
pub const UNKNOWN_SOURCE_KIND: &str = "unknown";

/// One candidate post/story.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    /// Persistence id, set once the item store has seen it.
    #[serde(default)]
    pub id: Option<i64>,
    pub title: String,
    /// Canonical URL; identity for dedup.
    pub url: String,
    /// Human-readable origin, e.g. subreddit name or "Hacker News".
    pub source: String,
    /// Provider tag used for weights and quotas, e.g. "reddit".
    #[serde(default = "default_source_kind")]
    pub source_kind: String,
    /// Upvotes / points.
    pub score: u64,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
    /// Unix seconds.
    pub created_at: i64,
}

fn default_source_kind() -> String {
    UNKNOWN_SOURCE_KIND.to_string()
}

impl Item {
    /// Bucket key; empty tags fall back to `"unknown"`.
    pub fn kind(&self) -> &str {
        let k = self.source_kind.trim();
        if k.is_empty() {
            UNKNOWN_SOURCE_KIND
        } else {
            k
        }
    }
}

/// Topic as stored by the topic collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicDefinition {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// provider kind → provider-specific source ids (subreddits, HN lists, ...)
    #[serde(default)]
    pub sources: HashMap<String, Vec<String>>,
}

impl TopicDefinition {
    pub fn sources_for(&self, kind: &str) -> &[String] {
        self.sources.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Output of one selection run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionResult {
    /// Final rank order: score desc, then created_at desc.
    pub selected: Vec<Item>,
    /// Everything not admitted, in input order.
    pub discarded: Vec<Item>,
}

/// A generated (or placeholder) digest with the items it was built from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Digest {
    pub id: i64,
    pub topic: String,
    pub markdown: String,
    pub created_at: DateTime<Utc>,
    pub sources: Vec<Item>,
}
