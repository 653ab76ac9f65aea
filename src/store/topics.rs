// src/store/topics.rs
//! Topic definitions loaded from TOML:
//!
//! ```toml
//! [[topics]]
//! name = "AI"
//! keywords = ["OpenAI", "LLM"]
//! [topics.sources]
//! reddit = ["artificial", "LocalLLaMA"]
//! hackernews = ["top", "best"]
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::TopicStore;
use crate::model::TopicDefinition;

#[derive(Debug, Clone, Default)]
pub struct TomlTopicStore {
    topics: Vec<TopicDefinition>,
}

#[derive(serde::Deserialize)]
struct TopicsFile {
    #[serde(default)]
    topics: Vec<TopicDefinition>,
}

impl TomlTopicStore {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading topics from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: TopicsFile = toml::from_str(s)?;
        let topics = file.topics.into_iter().map(clean_topic).collect();
        Ok(Self { topics })
    }
}

/// Trim keywords/sources, drop blanks, lowercase provider keys.
fn clean_topic(mut t: TopicDefinition) -> TopicDefinition {
    t.name = t.name.trim().to_string();
    t.keywords = clean_list(t.keywords);
    t.sources = t
        .sources
        .into_iter()
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), clean_list(v)))
        .collect::<HashMap<_, _>>();
    t
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    out
}

#[async_trait]
impl TopicStore for TomlTopicStore {
    async fn get_topic_by_name(&self, name: &str) -> Result<Option<TopicDefinition>> {
        Ok(self.topics.iter().find(|t| t.name == name).cloned())
    }

    async fn list_topic_names(&self) -> Result<Vec<String>> {
        Ok(self.topics.iter().map(|t| t.name.clone()).collect())
    }
}
