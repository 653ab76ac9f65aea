//! # Selector
//! Pure, testable logic that picks at most `max_items` items to forward to the
//! generator. No I/O.
//!
//! Policy:
//! 1. Under the cap (or uncapped) everything passes, sorted by score.
//! 2. Otherwise items are bucketed by `source_kind`, min-max normalized inside
//!    their bucket, and multiplied by the bucket weight.
//! 3. Buckets with a quota get a reserved share of the cap (quotas summing past
//!    1.0 are shrunk proportionally), filled by normalized score.
//! 4. Remaining slots go to the best weighted scores across every bucket.
//! 5. The admitted set is re-sorted by raw score for downstream use.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use metrics::counter;
use tracing::{debug, info};

use crate::config::SelectionConfig;
use crate::model::{Item, SelectionResult};

#[derive(Debug, Clone, Copy)]
struct Scored {
    idx: usize,
    normalized: f64,
    weighted: f64,
}

/// Raw score desc, newer first on ties. Stable, so equal items keep input order.
pub fn rank_by_score(items: &mut [Item]) {
    items.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

/// Run one selection. `items` must be unique by URL (see [`crate::ingest::merge`]).
pub fn select(items: Vec<Item>, cfg: &SelectionConfig) -> SelectionResult {
    let cap = match cfg.max_items {
        Some(n) if items.len() > n => n,
        _ => {
            let mut selected = items;
            rank_by_score(&mut selected);
            return SelectionResult {
                selected,
                discarded: Vec::new(),
            };
        }
    };

    // 1) Buckets in first-seen order of source kind.
    let mut bucket_index: HashMap<&str, usize> = HashMap::new();
    let mut buckets: Vec<(&str, Vec<usize>)> = Vec::new();
    for (idx, it) in items.iter().enumerate() {
        let kind = it.kind();
        let b = *bucket_index.entry(kind).or_insert_with(|| {
            buckets.push((kind, Vec::new()));
            buckets.len() - 1
        });
        buckets[b].1.push(idx);
    }

    // 2) + 3) Normalize within bucket, then weight.
    let mut scored: Vec<Vec<Scored>> = Vec::with_capacity(buckets.len());
    for (kind, idxs) in &buckets {
        let (min, max) = idxs.iter().fold((u64::MAX, 0u64), |(lo, hi), &i| {
            let s = items[i].score;
            (lo.min(s), hi.max(s))
        });
        let range = max.saturating_sub(min) as f64;
        let weight = cfg.source_weights.weight_for(kind);

        scored.push(
            idxs.iter()
                .map(|&idx| {
                    let normalized = if range == 0.0 {
                        1.0
                    } else {
                        (items[idx].score - min) as f64 / range
                    };
                    Scored {
                        idx,
                        normalized,
                        weighted: normalized * weight,
                    }
                })
                .collect(),
        );
    }

    // 4) Quota totals.
    let quota_total: f64 = buckets
        .iter()
        .filter_map(|(kind, _)| cfg.source_quotas.quota_for(kind))
        .sum();
    let quota_scale = if quota_total > 1.0 {
        info!(
            quota_total = %format_args!("{quota_total:.2}"),
            "source quotas sum past 1.0; scaling down to fit"
        );
        counter!("digest_quota_rescaled_total").increment(1);
        1.0 / quota_total
    } else {
        1.0
    };

    let mut admitted: Vec<usize> = Vec::with_capacity(cap);
    let mut admitted_urls: HashSet<&str> = HashSet::with_capacity(cap);

    // 5) Reserved phase.
    for ((kind, _), bucket) in buckets.iter().zip(&scored) {
        let Some(quota) = cfg.source_quotas.quota_for(kind) else {
            continue;
        };
        let target = (quota * quota_scale * cap as f64).floor() as usize;
        if target == 0 {
            debug!(source = kind, quota, "quota too small for cap; nothing reserved");
            continue;
        }

        let mut ranked = bucket.clone();
        ranked.sort_by(|a, b| {
            b.normalized
                .total_cmp(&a.normalized)
                .then_with(|| newer_first(&items, a.idx, b.idx))
        });

        let mut taken = 0usize;
        for s in ranked {
            if admitted.len() >= cap || taken >= target {
                break;
            }
            if admitted_urls.insert(items[s.idx].url.as_str()) {
                admitted.push(s.idx);
                taken += 1;
            }
        }
        debug!(source = kind, target, taken, "reserved quota filled");
    }

    // 6) Overflow phase.
    if admitted.len() < cap {
        let mut pool: Vec<Scored> = scored
            .iter()
            .flatten()
            .filter(|s| !admitted_urls.contains(items[s.idx].url.as_str()))
            .copied()
            .collect();
        pool.sort_by(|a, b| {
            b.weighted
                .total_cmp(&a.weighted)
                .then_with(|| b.normalized.total_cmp(&a.normalized))
                .then_with(|| newer_first(&items, a.idx, b.idx))
        });

        for s in pool {
            if admitted.len() >= cap {
                break;
            }
            if admitted_urls.insert(items[s.idx].url.as_str()) {
                admitted.push(s.idx);
            }
        }
    }

    // 7) + 8) Final order and the leftovers.
    let keep: HashSet<usize> = admitted.iter().copied().collect();
    let mut selected = Vec::with_capacity(admitted.len());
    let mut discarded = Vec::with_capacity(items.len() - admitted.len());
    for (idx, it) in items.into_iter().enumerate() {
        if keep.contains(&idx) {
            selected.push(it);
        } else {
            discarded.push(it);
        }
    }
    rank_by_score(&mut selected);

    SelectionResult {
        selected,
        discarded,
    }
}

fn newer_first(items: &[Item], a: usize, b: usize) -> Ordering {
    items[b].created_at.cmp(&items[a].created_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn it(title: &str, kind: &str, score: u64, created_at: i64) -> Item {
        Item {
            id: None,
            title: title.to_string(),
            url: format!("https://example.com/{title}"),
            source: "example".to_string(),
            source_kind: kind.to_string(),
            score,
            matched_keywords: Vec::new(),
            created_at,
        }
    }

    fn titles(v: &[Item]) -> Vec<&str> {
        v.iter().map(|i| i.title.as_str()).collect()
    }

    #[test]
    fn caps_by_score_without_weights_or_quotas() {
        let items = vec![
            it("low", "reddit", 10, 100),
            it("top", "reddit", 50, 200),
            it("mid", "reddit", 30, 150),
            it("second", "reddit", 40, 180),
        ];
        let out = select(items, &SelectionConfig::capped(2));
        assert_eq!(titles(&out.selected), vec!["top", "second"]);
        assert_eq!(titles(&out.discarded), vec!["low", "mid"]);
    }

    #[test]
    fn quotas_and_weights_mix_sources() {
        let items = vec![
            it("reddit-top", "reddit", 100, 200),
            it("reddit-second", "reddit", 90, 190),
            it("reddit-low", "reddit", 10, 100),
            it("hn-top", "hackernews", 40, 180),
            it("hn-second", "hackernews", 30, 170),
            it("hn-low", "hackernews", 20, 160),
        ];
        let cfg = SelectionConfig::capped(3)
            .with_weights([("reddit", 0.5), ("hackernews", 1.0)])
            .with_quotas([("reddit", 0.34), ("hackernews", 0.34)]);
        let out = select(items, &cfg);
        assert_eq!(
            titles(&out.selected),
            vec!["reddit-top", "hn-top", "hn-second"]
        );
        assert_eq!(out.discarded.len(), 3);
    }

    #[test]
    fn pass_through_when_under_cap() {
        let items = vec![it("a", "x", 1, 5), it("b", "x", 3, 1), it("c", "y", 3, 9)];
        let out = select(items, &SelectionConfig::capped(3));
        assert_eq!(titles(&out.selected), vec!["c", "b", "a"]);
        assert!(out.discarded.is_empty());
    }

    #[test]
    fn uncapped_sorts_everything() {
        let items = vec![it("a", "x", 1, 5), it("b", "x", 9, 1)];
        let out = select(items, &SelectionConfig::default());
        assert_eq!(titles(&out.selected), vec!["b", "a"]);
    }

    #[test]
    fn oversubscribed_quotas_are_scaled() {
        // 0.7 + 0.7 = 1.4 → each reserves floor(0.5 * 4) = 2.
        let mut items = Vec::new();
        for i in 0..4u64 {
            items.push(it(&format!("r{i}"), "reddit", 1000 + i, 0));
            items.push(it(&format!("h{i}"), "hackernews", 10 + i, 0));
        }
        let cfg = SelectionConfig::capped(4).with_quotas([("reddit", 0.7), ("hackernews", 0.7)]);
        let out = select(items, &cfg);
        let reddit = out.selected.iter().filter(|i| i.source_kind == "reddit").count();
        let hn = out.selected.len() - reddit;
        assert_eq!((reddit, hn), (2, 2));
    }

    #[test]
    fn tiny_quota_reserves_nothing_but_still_competes() {
        // floor(0.1 * 3) = 0 for hn; its items still win overflow on weight.
        let items = vec![
            it("r1", "reddit", 10, 0),
            it("r2", "reddit", 5, 0),
            it("r3", "reddit", 1, 0),
            it("h1", "hackernews", 7, 0),
            it("h2", "hackernews", 3, 0),
        ];
        let cfg = SelectionConfig::capped(3)
            .with_weights([("hackernews", 2.0)])
            .with_quotas([("hackernews", 0.1)]);
        let out = select(items, &cfg);
        // overflow weighted: h1=2.0, r1=1.0, h2=0.0, r2=~0.44
        assert_eq!(titles(&out.selected), vec!["r1", "h1", "r2"]);
    }

    #[test]
    fn degenerate_bucket_orders_by_weight_then_recency() {
        let items = vec![
            it("a-old", "a", 5, 10),
            it("a-new", "a", 5, 20),
            it("b-old", "b", 5, 10),
            it("b-new", "b", 5, 30),
        ];
        let cfg = SelectionConfig::capped(3).with_weights([("b", 1.5)]);
        let out = select(items, &cfg);
        let mut got = titles(&out.selected);
        got.sort();
        assert_eq!(got, vec!["a-new", "b-new", "b-old"]);
        // final order is score then recency
        assert_eq!(titles(&out.selected), vec!["b-new", "a-new", "b-old"]);
    }

    #[test]
    fn missing_kind_is_bucketed_as_unknown() {
        let items = vec![
            it("u1", "", 3, 0),
            it("u2", "", 2, 0),
            it("r1", "reddit", 1, 0),
        ];
        let cfg = SelectionConfig::capped(1).with_quotas([("unknown", 1.0)]);
        let out = select(items, &cfg);
        assert_eq!(titles(&out.selected), vec!["u1"]);
    }

    #[test]
    fn quota_never_exceeds_cap() {
        let items: Vec<Item> = (0..10u64).map(|i| it(&format!("r{i}"), "reddit", i, 0)).collect();
        let cfg = SelectionConfig::capped(4).with_quotas([("reddit", 1.0)]);
        let out = select(items, &cfg);
        assert_eq!(out.selected.len(), 4);
        assert_eq!(titles(&out.selected), vec!["r9", "r8", "r7", "r6"]);
    }
}
