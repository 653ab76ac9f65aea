// src/ingest/mod.rs
pub mod keywords;
pub mod providers;
pub mod types;

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;

use crate::ingest::types::NewsProvider;
use crate::model::{Item, TopicDefinition};
use crate::store::ItemStore;

pub use keywords::KeywordMatcher;

/// Providers drop anything older than this.
pub const RECENCY_WINDOW_SECS: i64 = 24 * 60 * 60;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("digest_runs_total", "Digest runs, labelled by outcome.");
        describe_counter!(
            "digest_items_fetched_total",
            "Items returned by providers before dedup."
        );
        describe_counter!(
            "digest_items_deduped_total",
            "Items dropped because another provider already returned the URL."
        );
        describe_counter!(
            "digest_items_selected_total",
            "Items forwarded to the generator."
        );
        describe_counter!(
            "digest_items_discarded_total",
            "Items left out by the selector."
        );
        describe_counter!(
            "digest_provider_errors_total",
            "Provider fetch failures (whole provider or single sub-request)."
        );
        describe_counter!(
            "digest_quota_rescaled_total",
            "Selections whose source quotas summed past 1.0."
        );
        describe_counter!(
            "digest_notify_failures_total",
            "Failed notification attempts."
        );
        describe_histogram!("digest_generate_ms", "Generator latency in milliseconds.");
    });
}

/// Decode HTML entities and collapse whitespace in a title.
pub fn normalize_title(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `created_at` within the last 24h of `now` (both unix seconds).
pub fn is_recent(created_at: i64, now: i64) -> bool {
    created_at >= now - RECENCY_WINDOW_SECS
}

/// Store unseen items and swap seen ones for their stored record, so ids stay
/// stable across runs. Items that fail to save are dropped with a warning.
pub async fn persist_new_items(store: &dyn ItemStore, items: Vec<Item>) -> Vec<Item> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match store.find_by_url(&item.url).await {
            Ok(Some(existing)) => out.push(existing),
            Ok(None) => match store.insert_item(&item).await {
                Ok(id) => out.push(Item {
                    id: Some(id),
                    ..item
                }),
                Err(e) => tracing::warn!(error = ?e, url = %item.url, "saving item failed"),
            },
            Err(e) => tracing::warn!(error = ?e, url = %item.url, "item lookup failed"),
        }
    }
    out
}

/// Run every provider concurrently, then persist each batch in the order of
/// `providers`. Persistence swaps in stored records, so it runs after the join:
/// a URL shared by two providers is stored from the earlier-registered one no
/// matter which call finished first. A failed provider contributes an empty
/// batch.
pub async fn fetch_all(
    providers: &[Arc<dyn NewsProvider>],
    topic: &TopicDefinition,
    store: &dyn ItemStore,
) -> Vec<Vec<Item>> {
    ensure_metrics_described();

    let calls = providers.iter().map(|p| async move {
        match p.fetch_for_topic(topic).await {
            Ok(items) => {
                tracing::info!(provider = p.name(), count = items.len(), "provider fetched");
                counter!("digest_items_fetched_total", "provider" => p.name()).increment(items.len() as u64);
                items
            }
            Err(e) => {
                tracing::warn!(error = ?e, provider = p.name(), "provider error");
                counter!("digest_provider_errors_total", "provider" => p.name()).increment(1);
                Vec::new()
            }
        }
    });
    let fetched = join_all(calls).await;

    let mut batches = Vec::with_capacity(fetched.len());
    for items in fetched {
        batches.push(persist_new_items(store, items).await);
    }
    batches
}

/// Merge provider batches by URL. The first occurrence wins and output keeps
/// first-seen order.
pub fn merge<I>(batches: I) -> Vec<Item>
where
    I: IntoIterator<Item = Vec<Item>>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    let mut dup = 0usize;
    for batch in batches {
        for item in batch {
            if seen.insert(item.url.clone()) {
                out.push(item);
            } else {
                dup += 1;
            }
        }
    }
    if dup > 0 {
        tracing::debug!(duplicates = dup, kept = out.len(), "merged provider results");
        counter!("digest_items_deduped_total").increment(dup as u64);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn item(url: &str, kind: &str) -> Item {
        Item {
            id: None,
            title: format!("title {url}"),
            url: url.to_string(),
            source: kind.to_string(),
            source_kind: kind.to_string(),
            score: 1,
            matched_keywords: vec![],
            created_at: 0,
        }
    }

    #[test]
    fn normalize_title_decodes_and_collapses() {
        assert_eq!(
            normalize_title("  Rust&nbsp;&amp;  WASM\n is &quot;here&quot; "),
            r#"Rust & WASM is "here""#
        );
    }

    #[test]
    fn recency_window_is_inclusive() {
        let now = 1_000_000;
        assert!(is_recent(now - RECENCY_WINDOW_SECS, now));
        assert!(!is_recent(now - RECENCY_WINDOW_SECS - 1, now));
        assert!(is_recent(now, now));
    }

    #[test]
    fn merge_keeps_first_provider_copy() {
        let reddit = vec![item("a", "reddit"), item("b", "reddit")];
        let hn = vec![item("b", "hackernews"), item("c", "hackernews"), item("a", "hackernews")];
        let out = merge(vec![reddit, hn]);
        let got: Vec<_> = out.iter().map(|i| (i.url.as_str(), i.source_kind.as_str())).collect();
        assert_eq!(got, vec![("a", "reddit"), ("b", "reddit"), ("c", "hackernews")]);
    }

    #[test]
    fn merge_of_nothing_is_empty() {
        assert!(merge(Vec::<Vec<Item>>::new()).is_empty());
        assert!(merge(vec![vec![], vec![]]).is_empty());
    }

    #[tokio::test]
    async fn persist_reuses_stored_records() {
        let store = MemoryStore::new();
        let first = persist_new_items(&store, vec![item("a", "reddit"), item("b", "reddit")]).await;
        assert_eq!(first.iter().map(|i| i.id).collect::<Vec<_>>(), vec![Some(1), Some(2)]);

        let mut changed = item("a", "reddit");
        changed.score = 999;
        let again = persist_new_items(&store, vec![changed, item("c", "reddit")]).await;
        assert_eq!(again[0].id, Some(1));
        assert_eq!(again[0].score, 1);
        assert_eq!(again[1].id, Some(3));
        assert_eq!(store.item_count(), 3);
    }

    struct Delayed {
        name: &'static str,
        ms: u64,
        items: Vec<Item>,
    }

    #[async_trait::async_trait]
    impl NewsProvider for Delayed {
        async fn fetch_for_topic(&self, _t: &TopicDefinition) -> anyhow::Result<Vec<Item>> {
            tokio::time::sleep(std::time::Duration::from_millis(self.ms)).await;
            Ok(self.items.clone())
        }
        fn name(&self) -> &'static str {
            self.name
        }
    }

    #[tokio::test]
    async fn shared_url_is_stored_from_first_registered_provider() {
        let store = MemoryStore::new();
        let mut from_reddit = item("https://shared.test/x", "reddit");
        from_reddit.score = 1;
        let mut from_hn = item("https://shared.test/x", "hackernews");
        from_hn.score = 99;
        let providers: Vec<Arc<dyn NewsProvider>> = vec![
            Arc::new(Delayed { name: "reddit", ms: 50, items: vec![from_reddit] }),
            Arc::new(Delayed { name: "hackernews", ms: 0, items: vec![from_hn] }),
        ];

        let batches = fetch_all(&providers, &TopicDefinition::default(), &store).await;
        assert_eq!(batches[0][0].source_kind, "reddit");
        // the later provider's copy is replaced by the stored record
        assert_eq!(batches[1][0].source_kind, "reddit");
        assert_eq!(batches[1][0].id, Some(1));

        let stored = store.find_by_url("https://shared.test/x").await.unwrap().unwrap();
        assert_eq!((stored.source_kind.as_str(), stored.score), ("reddit", 1));
    }
}
