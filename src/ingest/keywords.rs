//! Case-insensitive whole-word keyword matching.
//!
//! A keyword matches when it is not glued to another letter, digit or `_` on
//! either side, so `AI` does not hit "said" while `C++` and `.NET` still work.

use regex::Regex;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    patterns: Vec<(String, Regex)>,
}

impl KeywordMatcher {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Self {
        let mut patterns: Vec<(String, Regex)> = Vec::with_capacity(keywords.len());
        for kw in keywords {
            let kw = kw.as_ref().trim();
            if kw.is_empty() || patterns.iter().any(|(k, _)| k.eq_ignore_ascii_case(kw)) {
                continue;
            }
            let pat = format!(r"(?i)(?:^|[^\w]){}(?:[^\w]|$)", regex::escape(kw));
            match Regex::new(&pat) {
                Ok(re) => patterns.push((kw.to_string(), re)),
                Err(e) => warn!(keyword = kw, error = %e, "keyword skipped"),
            }
        }
        Self { patterns }
    }

    /// Keywords found in `text`, in configured order.
    pub fn find(&self, text: &str) -> Vec<String> {
        self.patterns
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(kw, _)| kw.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
