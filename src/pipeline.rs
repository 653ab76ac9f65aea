// src/pipeline.rs
//! One digest run: topic lookup, provider fan-out, dedup, selection,
//! generation, persistence and notification.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::{counter, histogram};
use tracing::{info, warn};

use crate::config::SelectionConfig;
use crate::generate::Generator;
use crate::ingest::types::NewsProvider;
use crate::ingest::{ensure_metrics_described, fetch_all, merge};
use crate::model::{Digest, Item};
use crate::notify::Notifier;
use crate::select::select;
use crate::store::{DigestStore, ItemStore, TopicStore};

const PREVIEW_TITLES: usize = 5;
const SUGGESTION_MIN_SIMILARITY: f64 = 0.8;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("topic '{name}' not found{}", suggestion_hint(.suggestion))]
    TopicNotFound {
        name: String,
        suggestion: Option<String>,
    },
    #[error("topic lookup failed: {0:#}")]
    TopicStore(anyhow::Error),
    #[error("summary generation failed: {0:#}")]
    Generator(anyhow::Error),
    #[error("saving digest failed: {0:#}")]
    Persistence(anyhow::Error),
}

fn suggestion_hint(s: &Option<String>) -> String {
    s.as_ref()
        .map(|s| format!(" (did you mean '{s}'?)"))
        .unwrap_or_default()
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct DigestRun {
    pub digest: Digest,
    /// Items returned by all providers, duplicates included.
    pub fetched: usize,
    /// Items left after dedup.
    pub unique: usize,
    /// Items the selector left out, in merge order.
    pub discarded: Vec<Item>,
    /// Non-fatal problems, e.g. a failed notification.
    pub warnings: Vec<String>,
}

impl DigestRun {
    pub fn is_empty(&self) -> bool {
        self.digest.sources.is_empty()
    }
}

pub fn empty_digest_text(topic: &str) -> String {
    format!("No new posts found for {topic} in the last 24 hours.")
}

/// Wired once at start-up; every collaborator is injected.
pub struct DigestPipeline {
    topics: Arc<dyn TopicStore>,
    providers: Vec<Arc<dyn NewsProvider>>,
    items: Arc<dyn ItemStore>,
    digests: Arc<dyn DigestStore>,
    generator: Arc<dyn Generator>,
    notifier: Option<Arc<dyn Notifier>>,
    selection: SelectionConfig,
}

impl DigestPipeline {
    /// `providers` must already be in registration order.
    pub fn new(
        topics: Arc<dyn TopicStore>,
        providers: Vec<Arc<dyn NewsProvider>>,
        items: Arc<dyn ItemStore>,
        digests: Arc<dyn DigestStore>,
        generator: Arc<dyn Generator>,
        selection: SelectionConfig,
    ) -> Self {
        ensure_metrics_described();
        Self {
            topics,
            providers,
            items,
            digests,
            generator,
            notifier: None,
            selection,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub async fn run(&self, topic_name: &str) -> Result<DigestRun, PipelineError> {
        let topic = match self
            .topics
            .get_topic_by_name(topic_name)
            .await
            .map_err(PipelineError::TopicStore)?
        {
            Some(t) => t,
            None => {
                counter!("digest_runs_total", "outcome" => "topic_not_found").increment(1);
                return Err(PipelineError::TopicNotFound {
                    name: topic_name.to_string(),
                    suggestion: self.suggest(topic_name).await,
                });
            }
        };

        let batches = fetch_all(&self.providers, &topic, self.items.as_ref()).await;
        let fetched: usize = batches.iter().map(Vec::len).sum();
        let merged = merge(batches);
        let unique = merged.len();
        info!(topic = %topic.name, fetched, unique, "provider results merged");

        if merged.is_empty() {
            let markdown = empty_digest_text(&topic.name);
            let digest = self.save(&topic.name, markdown, &[]).await?;
            counter!("digest_runs_total", "outcome" => "empty").increment(1);
            info!(topic = %topic.name, digest = digest.id, "no items; placeholder digest saved");
            return Ok(DigestRun {
                digest,
                fetched,
                unique,
                discarded: Vec::new(),
                warnings: Vec::new(),
            });
        }

        let selection = select(merged, &self.selection);
        if !selection.discarded.is_empty() {
            info!(
                topic = %topic.name,
                discarded = %preview_titles(&selection.discarded),
                "truncating news items from {} to {}",
                unique,
                selection.selected.len()
            );
        }
        counter!("digest_items_selected_total").increment(selection.selected.len() as u64);
        counter!("digest_items_discarded_total").increment(selection.discarded.len() as u64);

        let started = Instant::now();
        let markdown = match self
            .generator
            .summarize(&selection.selected, &topic.name)
            .await
        {
            Ok(md) => md,
            Err(e) => {
                warn!(error = ?e, topic = %topic.name, generator = self.generator.provider_name(), "generation failed");
                counter!("digest_runs_total", "outcome" => "generator_failed").increment(1);
                return Err(PipelineError::Generator(e));
            }
        };
        histogram!("digest_generate_ms").record(started.elapsed().as_millis() as f64);

        let digest = self.save(&topic.name, markdown, &selection.selected).await?;

        let mut warnings = Vec::new();
        if let Some(n) = &self.notifier {
            if !digest.sources.is_empty() {
                if let Err(e) = n.publish(&digest).await {
                    warn!(error = ?e, notifier = n.name(), digest = digest.id, "notification failed");
                    counter!("digest_notify_failures_total", "notifier" => n.name()).increment(1);
                    warnings.push(format!("{} notification failed: {e:#}", n.name()));
                }
            }
        }

        counter!("digest_runs_total", "outcome" => "ok").increment(1);
        info!(
            topic = %topic.name,
            digest = digest.id,
            selected = digest.sources.len(),
            warnings = warnings.len(),
            "digest ready"
        );
        Ok(DigestRun {
            digest,
            fetched,
            unique,
            discarded: selection.discarded,
            warnings,
        })
    }

    /// Store the digest linked to every source that has an id, in one call.
    async fn save(&self, topic: &str, markdown: String, sources: &[Item]) -> Result<Digest, PipelineError> {
        let created_at = Utc::now();
        let source_ids: Vec<i64> = sources.iter().filter_map(|it| it.id).collect();
        let id = self
            .digests
            .insert_digest(topic, &markdown, created_at, &source_ids)
            .await
            .map_err(PipelineError::Persistence)?;
        Ok(Digest {
            id,
            topic: topic.to_string(),
            markdown,
            created_at,
            sources: sources.to_vec(),
        })
    }

    async fn suggest(&self, name: &str) -> Option<String> {
        let names = match self.topics.list_topic_names().await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = ?e, "listing topics for suggestion failed");
                return None;
            }
        };
        closest_name(name, &names)
    }
}

/// Best Jaro-Winkler match at or above the similarity floor.
pub fn closest_name(name: &str, candidates: &[String]) -> Option<String> {
    let needle = name.to_lowercase();
    candidates
        .iter()
        .map(|c| (strsim::jaro_winkler(&needle, &c.to_lowercase()), c))
        .filter(|(score, _)| *score >= SUGGESTION_MIN_SIMILARITY)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c.clone())
}

fn preview_titles(items: &[Item]) -> String {
    let mut out = items
        .iter()
        .take(PREVIEW_TITLES)
        .map(|it| it.title.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    if items.len() > PREVIEW_TITLES {
        out.push_str(&format!(" (+{} more)", items.len() - PREVIEW_TITLES));
    }
    out
}
