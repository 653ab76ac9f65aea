// src/notify/slack.rs
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};

use super::Notifier;
use crate::config::SlackConfig;
use crate::model::{Digest, Item};

/// Slack rejects section text longer than 3000 chars.
const SECTION_LIMIT: usize = 2900;
const TOP_SOURCES: usize = 5;

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold regex"));
static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("link regex"));

pub struct SlackNotifier {
    webhook_url: String,
    channel_id: String,
    client: Client,
    posted: Mutex<HashSet<(i64, String)>>,
}

impl SlackNotifier {
    pub fn new(webhook_url: impl Into<String>, channel_id: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("building slack http client")?;
        Ok(Self {
            webhook_url: webhook_url.into(),
            channel_id: channel_id.into(),
            client,
            posted: Mutex::new(HashSet::new()),
        })
    }

    /// `None` unless Slack is enabled, auto-posting, and has a webhook.
    pub fn from_config(cfg: &SlackConfig) -> Result<Option<Self>> {
        if !cfg.should_auto_post() {
            tracing::debug!("slack auto-post disabled");
            return Ok(None);
        }
        match cfg.webhook_url.as_deref() {
            Some(url) => Self::new(url, cfg.channel_id.clone()).map(Some),
            None => Ok(None),
        }
    }

    /// Claim `(digest, channel)` before sending; false if already claimed.
    fn reserve(&self, digest_id: i64) -> bool {
        self.posted
            .lock()
            .expect("slack posted-set mutex poisoned")
            .insert((digest_id, self.channel_id.clone()))
    }

    fn release(&self, digest_id: i64) {
        self.posted
            .lock()
            .expect("slack posted-set mutex poisoned")
            .remove(&(digest_id, self.channel_id.clone()));
    }

    async fn send(&self, body: &Value) -> Result<()> {
        self.client
            .post(&self.webhook_url)
            .json(body)
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn publish(&self, digest: &Digest) -> Result<()> {
        if digest.sources.is_empty() {
            bail!("refusing to post digest {} with no sources", digest.id);
        }
        if !self.reserve(digest.id) {
            bail!(
                "digest {} already posted to channel {}",
                digest.id,
                self.channel_id
            );
        }

        let body = build_payload(digest);
        if let Err(e) = self.send(&body).await {
            self.release(digest.id);
            return Err(e);
        }
        tracing::info!(digest = digest.id, channel = %self.channel_id, "digest posted to slack");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}

/// Block Kit message: header, context, one section per `## ` heading, sources.
pub fn build_payload(digest: &Digest) -> Value {
    let mut blocks = vec![
        json!({
            "type": "header",
            "text": { "type": "plain_text", "text": format!("{} Digest", digest.topic) }
        }),
        json!({
            "type": "context",
            "elements": [{
                "type": "mrkdwn",
                "text": format!(
                    "*Topic:* {} | *Generated:* {}",
                    digest.topic,
                    digest.created_at.format("%Y-%m-%d %H:%M UTC")
                )
            }]
        }),
        json!({ "type": "divider" }),
    ];

    for (heading, body) in split_sections(&digest.markdown) {
        let mut text = match heading {
            Some(h) => format!("*{}*\n{}", to_mrkdwn(h), to_mrkdwn(body.trim())),
            None => to_mrkdwn(body.trim()),
        };
        if text.trim().is_empty() {
            continue;
        }
        truncate_chars(&mut text, SECTION_LIMIT);
        blocks.push(json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": text }
        }));
    }

    blocks.push(json!({ "type": "divider" }));
    blocks.push(json!({
        "type": "section",
        "text": { "type": "mrkdwn", "text": sources_text(&digest.sources) }
    }));
    if digest.sources.len() > TOP_SOURCES {
        blocks.push(json!({
            "type": "context",
            "elements": [{
                "type": "mrkdwn",
                "text": format!("...and {} more", digest.sources.len() - TOP_SOURCES)
            }]
        }));
    }

    json!({
        "text": format!("{} Digest", digest.topic),
        "blocks": blocks
    })
}

/// `(heading, body)` pairs; text before the first heading has no heading.
fn split_sections(md: &str) -> Vec<(Option<&str>, String)> {
    let mut out: Vec<(Option<&str>, String)> = vec![(None, String::new())];
    for line in md.lines() {
        if let Some(h) = line.strip_prefix("## ") {
            out.push((Some(h.trim()), String::new()));
        } else if let Some((_, body)) = out.last_mut() {
            body.push_str(line);
            body.push('\n');
        }
    }
    out.retain(|(h, b)| h.is_some() || !b.trim().is_empty());
    out
}

/// Markdown → Slack mrkdwn.
pub fn to_mrkdwn(md: &str) -> String {
    let escaped = md
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    let linked = LINK.replace_all(&escaped, "<$2|$1>");
    let bolded = BOLD.replace_all(&linked, "*$1*");
    bolded
        .lines()
        .map(|l| {
            if let Some(rest) = l.strip_prefix("### ") {
                format!("*{}*", rest.trim())
            } else if let Some(rest) = l.strip_prefix("- ").or_else(|| l.strip_prefix("* ")) {
                format!("• {rest}")
            } else {
                l.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn source_label(it: &Item) -> String {
    if it.kind() == "reddit" {
        format!("r/{}", it.source)
    } else {
        it.source.clone()
    }
}

fn sources_text(sources: &[Item]) -> String {
    let mut text = String::from("*Top sources*");
    for it in sources.iter().take(TOP_SOURCES) {
        text.push_str(&format!(
            "\n• <{}|{}> ({})",
            it.url,
            it.title.replace('|', "/").replace('>', "&gt;"),
            source_label(it)
        ));
    }
    text
}

fn truncate_chars(s: &mut String, max: usize) {
    if let Some((idx, _)) = s.char_indices().nth(max) {
        s.truncate(idx);
        s.push('…');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(i: u64, kind: &str) -> Item {
        Item {
            id: Some(i as i64),
            title: format!("Story {i}"),
            url: format!("https://x.test/{i}"),
            source: if kind == "reddit" { "rust".into() } else { "Hacker News".into() },
            source_kind: kind.into(),
            score: i,
            matched_keywords: vec![],
            created_at: 0,
        }
    }

    fn digest(n: u64) -> Digest {
        Digest {
            id: 9,
            topic: "AI".into(),
            markdown: "Intro line\n## Overview\nA **big** day.\n## Key Developments\n- [Paper](https://p.test/1) out\n".into(),
            created_at: chrono::Utc.with_ymd_and_hms(2026, 10, 18, 8, 30, 0).unwrap(),
            sources: (1..=n).map(|i| item(i, if i % 2 == 0 { "hackernews" } else { "reddit" })).collect(),
        }
    }

    #[test]
    fn mrkdwn_conversion() {
        assert_eq!(to_mrkdwn("**bold** and [t](https://u.test/a?b=1)"), "*bold* and <https://u.test/a?b=1|t>");
        assert_eq!(to_mrkdwn("- one\n### Sub\na < b"), "• one\n*Sub*\na &lt; b");
    }

    #[test]
    fn payload_has_one_section_per_heading() {
        let p = build_payload(&digest(7));
        let blocks = p["blocks"].as_array().unwrap();
        assert_eq!(blocks[0]["type"], "header");
        assert_eq!(blocks[0]["text"]["text"], "AI Digest");
        assert!(blocks[1]["elements"][0]["text"]
            .as_str()
            .unwrap()
            .contains("2026-10-18 08:30 UTC"));

        let sections: Vec<&str> = blocks
            .iter()
            .filter(|b| b["type"] == "section")
            .map(|b| b["text"]["text"].as_str().unwrap())
            .collect();
        assert_eq!(sections.len(), 4);
        assert_eq!(sections[0], "Intro line");
        assert_eq!(sections[1], "*Overview*\nA *big* day.");
        assert_eq!(sections[2], "*Key Developments*\n• <https://p.test/1|Paper> out");
        assert!(sections[3].contains("(r/rust)"));
        assert!(sections[3].contains("(Hacker News)"));
        assert_eq!(sections[3].matches('•').count(), 5);

        let last = blocks.last().unwrap();
        assert_eq!(last["elements"][0]["text"], "...and 2 more");
    }

    #[test]
    fn no_more_footer_for_short_lists() {
        let p = build_payload(&digest(3));
        let last = p["blocks"].as_array().unwrap().last().unwrap().clone();
        assert_eq!(last["type"], "section");
    }

    #[tokio::test]
    async fn empty_digest_is_refused_without_a_request() {
        let n = SlackNotifier::new("http://127.0.0.1:9/hook", "general").unwrap();
        let err = n.publish(&digest(0)).await.unwrap_err();
        assert!(err.to_string().contains("no sources"));
    }

    #[test]
    fn from_config_requires_both_switches() {
        let mut cfg = SlackConfig {
            enabled: true,
            auto_post: false,
            webhook_url: Some("https://hooks.test/x".into()),
            channel_id: "general".into(),
        };
        assert!(SlackNotifier::from_config(&cfg).unwrap().is_none());
        cfg.auto_post = true;
        assert!(SlackNotifier::from_config(&cfg).unwrap().is_some());
        cfg.webhook_url = None;
        assert!(SlackNotifier::from_config(&cfg).unwrap().is_none());
    }
}
