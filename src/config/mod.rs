// src/config/mod.rs
//! Process configuration, read from the environment (`.env` is loaded by the binary).
//!
//! Every setting is optional. Bad values fall back to defaults with a warning
//! instead of aborting start-up.

pub mod selection;

use std::path::PathBuf;
use std::time::Duration;

pub use selection::{parse_max_items, SelectionConfig, SourceQuotas, SourceWeights};

pub const DEFAULT_TOPICS_CONFIG_PATH: &str = "config/topics.toml";
pub const ENV_TOPICS_CONFIG_PATH: &str = "TOPICS_CONFIG_PATH";

#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    /// Keep subreddit posts that match no keyword.
    pub include_unmatched: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmBackend {
    Ollama,
    OpenAi,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub ollama_url: String,
    pub ollama_model: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub log_enabled: bool,
    pub log_path: PathBuf,
    pub pricing_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub enabled: bool,
    pub auto_post: bool,
    pub webhook_url: Option<String>,
    pub channel_id: String,
}

impl SlackConfig {
    /// Digests are pushed automatically only when both switches are on and a
    /// webhook exists.
    pub fn should_auto_post(&self) -> bool {
        self.enabled && self.auto_post && self.webhook_url.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub selection: SelectionConfig,
    pub active_providers: Vec<String>,
    pub use_mock_data: bool,
    pub http_timeout: Duration,
    pub reddit: RedditConfig,
    pub llm: LlmConfig,
    pub slack: SlackConfig,
    pub topics_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup (tests pass a map instead of mutating env).
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get_or = |k: &str, d: &str| {
            get(k)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| d.to_string())
        };
        let flag = |k: &str, d: bool| get(k).map(|v| parse_bool(&v)).unwrap_or(d);

        let selection = SelectionConfig {
            max_items: parse_max_items(get("SUMMARY_MAX_ITEMS").as_deref()),
            source_weights: SourceWeights::from_json_str(
                &get("SUMMARY_SOURCE_WEIGHTS").unwrap_or_default(),
            ),
            source_quotas: SourceQuotas::from_json_str(
                &get("SUMMARY_SOURCE_QUOTAS").unwrap_or_default(),
            ),
        };

        let active_providers = parse_list(&get_or("ACTIVE_NEWS_PROVIDERS", "reddit"));

        let http_timeout = get("HTTP_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(15));

        let backend = match get_or("LLM_PROVIDER", "ollama").to_ascii_lowercase().as_str() {
            "openai" => LlmBackend::OpenAi,
            "ollama" => LlmBackend::Ollama,
            other => {
                tracing::warn!(provider = other, "unknown LLM_PROVIDER; using ollama");
                LlmBackend::Ollama
            }
        };

        Self {
            selection,
            active_providers,
            use_mock_data: flag("USE_MOCK_DATA", false),
            http_timeout,
            reddit: RedditConfig {
                client_id: get("REDDIT_CLIENT_ID").unwrap_or_default(),
                client_secret: get("REDDIT_CLIENT_SECRET").unwrap_or_default(),
                user_agent: get_or("REDDIT_USER_AGENT", "topic-digest/0.1"),
                include_unmatched: flag("REDDIT_INCLUDE_UNMATCHED", true),
            },
            llm: LlmConfig {
                backend,
                ollama_url: get_or("OLLAMA_API_URL", "http://localhost:11434"),
                ollama_model: get_or("OLLAMA_MODEL", "gpt-oss:20b"),
                openai_api_key: get("OPENAI_API_KEY").unwrap_or_default(),
                openai_model: get_or("OPENAI_MODEL", "gpt-4o-mini"),
                log_enabled: flag("LLM_LOGGING_ENABLED", true),
                log_path: PathBuf::from(get_or("LLM_LOG_PATH", "./llm-requests.log")),
                pricing_path: get("LLM_PRICING_PATH")
                    .filter(|v| !v.trim().is_empty())
                    .map(PathBuf::from),
            },
            slack: SlackConfig {
                enabled: flag("SLACK_ENABLED", false),
                auto_post: flag("SLACK_AUTO_POST", false),
                webhook_url: get("SLACK_WEBHOOK_URL").filter(|v| !v.trim().is_empty()),
                channel_id: get_or("SLACK_CHANNEL_ID", "general"),
            },
            topics_path: PathBuf::from(get_or(ENV_TOPICS_CONFIG_PATH, DEFAULT_TOPICS_CONFIG_PATH)),
        }
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1")
}

/// Comma list → trimmed, lowercased, non-empty, first occurrence kept.
fn parse_list(s: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in s.split(',') {
        let p = part.trim().to_ascii_lowercase();
        if !p.is_empty() && !out.contains(&p) {
            out.push(p);
        }
    }
    out
}
