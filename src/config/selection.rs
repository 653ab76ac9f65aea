//! # Selection knobs
//!
//! Per-source weights and quotas plus the item cap that parameterize
//! [`crate::select::select`].
//!
//! - Raw input is a loosely typed JSON object (`{"reddit": 0.5, "hackernews": "1"}`).
//! - Entries are validated at the boundary: non-numeric or non-finite values are
//!   dropped with a warning, so the selector only ever sees clean `f64`s.
//! - Missing entries fall back to behavior-preserving defaults
//!   (weight `1.0`, no reserved quota, uncapped).

use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Multiplier applied to a bucket's normalized score during overflow ranking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceWeights(HashMap<String, f64>);

impl SourceWeights {
    pub fn new(map: HashMap<String, f64>) -> Self {
        Self(map.into_iter().filter(|(_, v)| v.is_finite()).collect())
    }

    /// Parse a JSON object string; malformed input yields an empty map.
    pub fn from_json_str(raw: &str) -> Self {
        Self::new(parse_number_map(raw, "SUMMARY_SOURCE_WEIGHTS"))
    }

    /// Weight for a source kind; `1.0` when unset.
    pub fn weight_for(&self, kind: &str) -> f64 {
        self.0.get(kind).copied().unwrap_or(1.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Reserved fraction of `max_items` per source kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceQuotas(HashMap<String, f64>);

impl SourceQuotas {
    pub fn new(map: HashMap<String, f64>) -> Self {
        Self(map.into_iter().filter(|(_, v)| v.is_finite()).collect())
    }

    pub fn from_json_str(raw: &str) -> Self {
        Self::new(parse_number_map(raw, "SUMMARY_SOURCE_QUOTAS"))
    }

    /// Positive quota for a kind, or `None` (competes in overflow only).
    pub fn quota_for(&self, kind: &str) -> Option<f64> {
        self.0.get(kind).copied().filter(|q| *q > 0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Immutable parameters for one selection run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionConfig {
    /// `None` = pass-through (no cap).
    pub max_items: Option<usize>,
    pub source_weights: SourceWeights,
    pub source_quotas: SourceQuotas,
}

impl SelectionConfig {
    pub fn capped(max_items: usize) -> Self {
        Self {
            max_items: parse_max_items_value(max_items as i64),
            ..Self::default()
        }
    }

    /// Add or overwrite weights; non-finite values are ignored.
    pub fn with_weights<K: Into<String>>(mut self, pairs: impl IntoIterator<Item = (K, f64)>) -> Self {
        self.source_weights.0.extend(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .filter(|(_, v)| v.is_finite()),
        );
        self
    }

    /// Add or overwrite quotas; non-finite values are ignored.
    pub fn with_quotas<K: Into<String>>(mut self, pairs: impl IntoIterator<Item = (K, f64)>) -> Self {
        self.source_quotas.0.extend(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .filter(|(_, v)| v.is_finite()),
        );
        self
    }
}

fn parse_max_items_value(v: i64) -> Option<usize> {
    usize::try_from(v).ok().filter(|n| *n > 0)
}

/// Parse the cap from its raw string form. Anything other than a positive
/// integer means uncapped.
pub fn parse_max_items(raw: Option<&str>) -> Option<usize> {
    let s = raw?.trim();
    if s.is_empty() {
        return None;
    }
    match s.parse::<i64>() {
        Ok(v) => parse_max_items_value(v),
        Err(_) => {
            warn!(value = s, "SUMMARY_MAX_ITEMS is not an integer; running uncapped");
            None
        }
    }
}

/// Parse `{"key": number | "numeric string"}`; drops anything else.
pub fn parse_number_map(raw: &str, label: &str) -> HashMap<String, f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return HashMap::new();
    }

    let parsed: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(setting = label, error = %e, "malformed JSON map; using defaults");
            return HashMap::new();
        }
    };

    let Value::Object(obj) = parsed else {
        warn!(setting = label, "expected a JSON object; using defaults");
        return HashMap::new();
    };

    let mut out = HashMap::with_capacity(obj.len());
    for (key, value) in obj {
        let num = match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match num.filter(|n| n.is_finite()) {
            Some(n) => {
                out.insert(key, n);
            }
            None => warn!(setting = label, key = %key, "non-numeric entry ignored"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_default_to_one() {
        let w = SourceWeights::from_json_str(r#"{"reddit": 0.5}"#);
        assert!((w.weight_for("reddit") - 0.5).abs() < 1e-9);
        assert!((w.weight_for("hackernews") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn numeric_strings_are_accepted_and_junk_dropped() {
        let m = parse_number_map(r#"{"a":"0.25","b":"lots","c":null,"d":3}"#, "test");
        assert_eq!(m.len(), 2);
        assert!((m["a"] - 0.25).abs() < 1e-9);
        assert!((m["d"] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn malformed_or_non_object_input_is_empty() {
        assert!(parse_number_map("{not json", "test").is_empty());
        assert!(parse_number_map("[1,2]", "test").is_empty());
        assert!(parse_number_map("", "test").is_empty());
    }

    #[test]
    fn non_positive_quota_means_none() {
        let q = SourceQuotas::from_json_str(r#"{"reddit":0,"hackernews":-0.2,"lobsters":0.3}"#);
        assert_eq!(q.quota_for("reddit"), None);
        assert_eq!(q.quota_for("hackernews"), None);
        assert_eq!(q.quota_for("lobsters"), Some(0.3));
        assert_eq!(q.quota_for("missing"), None);
    }

    #[test]
    fn max_items_only_accepts_positive_integers() {
        assert_eq!(parse_max_items(Some("40")), Some(40));
        assert_eq!(parse_max_items(Some(" 3 ")), Some(3));
        assert_eq!(parse_max_items(Some("0")), None);
        assert_eq!(parse_max_items(Some("-5")), None);
        assert_eq!(parse_max_items(Some("2.5")), None);
        assert_eq!(parse_max_items(Some("abc")), None);
        assert_eq!(parse_max_items(None), None);
    }

    #[test]
    fn capped_zero_is_uncapped() {
        assert_eq!(SelectionConfig::capped(0).max_items, None);
        assert_eq!(SelectionConfig::capped(7).max_items, Some(7));
    }
}
