// src/ingest/providers/reddit.rs
use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::config::RedditConfig;
use crate::ingest::types::NewsProvider;
use crate::ingest::{is_recent, normalize_title, KeywordMatcher};
use crate::model::{Item, TopicDefinition};

pub const REDDIT_AUTH_BASE: &str = "https://www.reddit.com";
pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";
const KIND: &str = "reddit";
const HOT_LIMIT: usize = 50;
const SEARCH_LIMIT: usize = 20;
const MAX_KEYWORD_SEARCHES: usize = 3;
/// Refresh this many seconds before the token actually expires.
const TOKEN_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: i64,
}

impl CachedToken {
    fn is_fresh(&self, now: i64) -> bool {
        now + TOKEN_SKEW_SECS < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    title: String,
    #[serde(default)]
    selftext: String,
    permalink: String,
    subreddit: String,
    #[serde(default)]
    score: i64,
    created_utc: f64,
}

/// Subreddit hot listings plus a keyword search, over the OAuth API
/// (client-credentials grant).
pub struct RedditProvider {
    http: reqwest::Client,
    cfg: RedditConfig,
    auth_base: String,
    api_base: String,
    token: RwLock<Option<CachedToken>>,
}

impl RedditProvider {
    pub fn new(http: reqwest::Client, cfg: RedditConfig) -> Self {
        Self {
            http,
            cfg,
            auth_base: REDDIT_AUTH_BASE.to_string(),
            api_base: REDDIT_API_BASE.to_string(),
            token: RwLock::new(None),
        }
    }

    pub fn with_endpoints(mut self, auth_base: impl Into<String>, api_base: impl Into<String>) -> Self {
        self.auth_base = auth_base.into().trim_end_matches('/').to_string();
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    async fn access_token(&self) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        if let Some(t) = self.token.read().await.as_ref() {
            if t.is_fresh(now) {
                return Ok(t.access_token.clone());
            }
        }

        let mut guard = self.token.write().await;
        // another task may have refreshed while we waited
        if let Some(t) = guard.as_ref() {
            if t.is_fresh(now) {
                return Ok(t.access_token.clone());
            }
        }

        if self.cfg.client_id.trim().is_empty() || self.cfg.client_secret.trim().is_empty() {
            bail!("reddit credentials missing (set REDDIT_CLIENT_ID and REDDIT_CLIENT_SECRET)");
        }

        let resp: TokenResponse = self
            .http
            .post(format!("{}/api/v1/access_token", self.auth_base))
            .basic_auth(&self.cfg.client_id, Some(&self.cfg.client_secret))
            .header(reqwest::header::USER_AGENT, &self.cfg.user_agent)
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .context("reddit token request")?
            .error_for_status()
            .context("reddit token non-2xx")?
            .json()
            .await
            .context("reddit token json")?;

        tracing::debug!(expires_in = resp.expires_in, "reddit token refreshed");
        let token = resp.access_token.clone();
        *guard = Some(CachedToken {
            access_token: resp.access_token,
            expires_at: now + resp.expires_in,
        });
        Ok(token)
    }

    async fn get_listing(&self, token: &str, path: &str, query: &[(&str, String)]) -> Result<Vec<Post>> {
        let listing: Listing = self
            .http
            .get(format!("{}{path}", self.api_base))
            .bearer_auth(token)
            .header(reqwest::header::USER_AGENT, &self.cfg.user_agent)
            .query(query)
            .send()
            .await
            .with_context(|| format!("reddit get {path}"))?
            .error_for_status()
            .with_context(|| format!("reddit {path} non-2xx"))?
            .json()
            .await
            .with_context(|| format!("reddit {path} json"))?;
        Ok(listing.data.children.into_iter().map(|c| c.data).collect())
    }

    fn to_item(post: Post, matched: Vec<String>) -> Item {
        Item {
            id: None,
            title: normalize_title(&post.title),
            url: format!("https://reddit.com{}", post.permalink),
            source: post.subreddit,
            source_kind: KIND.to_string(),
            score: post.score.max(0) as u64,
            matched_keywords: matched,
            created_at: post.created_utc as i64,
        }
    }
}

#[async_trait]
impl NewsProvider for RedditProvider {
    async fn fetch_for_topic(&self, topic: &TopicDefinition) -> Result<Vec<Item>> {
        let subreddits = topic.sources_for(KIND);
        if subreddits.is_empty() {
            tracing::info!(topic = %topic.name, provider = KIND, "no sources configured");
            return Ok(Vec::new());
        }

        let token = self.access_token().await?;
        let matcher = KeywordMatcher::new(&topic.keywords);
        let now = chrono::Utc::now().timestamp();

        let mut seen: HashSet<String> = HashSet::new();
        let mut items: Vec<Item> = Vec::new();
        let mut push = |post: Post, require_match: bool| {
            if !is_recent(post.created_utc as i64, now) {
                return;
            }
            let haystack = format!("{} {}", post.title, post.selftext);
            let matched = matcher.find(&haystack);
            if matched.is_empty() && (require_match || !self.cfg.include_unmatched) {
                return;
            }
            let item = Self::to_item(post, matched);
            if seen.insert(item.url.clone()) {
                items.push(item);
            }
        };

        for sub in subreddits {
            let path = format!("/r/{sub}/hot");
            match self
                .get_listing(&token, &path, &[("limit", HOT_LIMIT.to_string())])
                .await
            {
                Ok(posts) => posts.into_iter().for_each(|p| push(p, false)),
                Err(e) => {
                    tracing::warn!(error = ?e, subreddit = %sub, "subreddit fetch failed");
                    counter!("digest_provider_errors_total", "provider" => KIND).increment(1);
                }
            }
        }

        for kw in topic.keywords.iter().filter(|k| !k.trim().is_empty()).take(MAX_KEYWORD_SEARCHES) {
            let query = [
                ("q", kw.trim().to_string()),
                ("t", "day".to_string()),
                ("sort", "hot".to_string()),
                ("limit", SEARCH_LIMIT.to_string()),
            ];
            match self.get_listing(&token, "/search", &query).await {
                Ok(posts) => posts.into_iter().for_each(|p| push(p, true)),
                Err(e) => {
                    tracing::warn!(error = ?e, keyword = %kw, "reddit search failed");
                    counter!("digest_provider_errors_total", "provider" => KIND).increment(1);
                }
            }
        }

        tracing::info!(topic = %topic.name, count = items.len(), "reddit posts collected");
        Ok(items)
    }

    fn name(&self) -> &'static str {
        KIND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(id: &str) -> RedditConfig {
        RedditConfig {
            client_id: id.into(),
            client_secret: if id.is_empty() { String::new() } else { "s".into() },
            user_agent: "test/0.1".into(),
            include_unmatched: true,
        }
    }

    #[test]
    fn token_freshness_respects_skew() {
        let t = CachedToken {
            access_token: "x".into(),
            expires_at: 1_000,
        };
        assert!(t.is_fresh(1_000 - TOKEN_SKEW_SECS - 1));
        assert!(!t.is_fresh(1_000 - TOKEN_SKEW_SECS));
    }

    #[test]
    fn post_maps_to_item() {
        let post = Post {
            title: "Rust &amp; AI".into(),
            selftext: String::new(),
            permalink: "/r/rust/comments/abc/x/".into(),
            subreddit: "rust".into(),
            score: -4,
            created_utc: 1_700_000_000.7,
        };
        let it = RedditProvider::to_item(post, vec!["AI".into()]);
        assert_eq!(it.url, "https://reddit.com/r/rust/comments/abc/x/");
        assert_eq!(it.title, "Rust & AI");
        assert_eq!(it.score, 0);
        assert_eq!(it.created_at, 1_700_000_000);
        assert_eq!(it.source, "rust");
    }

    #[tokio::test]
    async fn missing_credentials_fail_the_provider() {
        let p = RedditProvider::new(reqwest::Client::new(), cfg(""))
            .with_endpoints("http://127.0.0.1:9", "http://127.0.0.1:9");
        let mut topic = TopicDefinition {
            name: "AI".into(),
            keywords: vec!["AI".into()],
            ..Default::default()
        };
        topic.sources.insert("reddit".into(), vec!["MachineLearning".into()]);
        let err = p.fetch_for_topic(&topic).await.unwrap_err();
        assert!(err.to_string().contains("credentials"));
    }
}
