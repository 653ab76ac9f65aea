// src/generate/openai.rs
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::pricing::PricingTable;
use super::prompt::{fingerprint, system_prompt, user_prompt};
use super::request_log::{RequestLog, RequestRecord};
use super::{Generator, EMPTY_INPUT_TEXT};
use crate::model::Item;

pub const OPENAI_API_BASE: &str = "https://api.openai.com";
const PROVIDER: &str = "openai";
const MAX_TOKENS: u32 = 2000;

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatReq<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResp {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default, Clone, Copy)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

pub struct OpenAiGenerator {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    pricing: PricingTable,
    log: Arc<RequestLog>,
}

impl OpenAiGenerator {
    pub fn new(api_key: &str, model: &str, log: Arc<RequestLog>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(120))
            .build()
            .context("building openai client")?;
        Ok(Self {
            http,
            base_url: OPENAI_API_BASE.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            pricing: PricingTable::builtin(),
            log,
        })
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = pricing;
        self
    }

    async fn chat(&self, system: &str, user: &str) -> Result<(String, Usage)> {
        let req = ChatReq {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.3,
            max_tokens: MAX_TOKENS,
        };
        let resp: ChatResp = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("openai request")?
            .error_for_status()
            .context("openai non-2xx")?
            .json()
            .await
            .context("openai json")?;

        let text = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("openai returned no content"))?;
        Ok((text, resp.usage.unwrap_or_default()))
    }
}

#[async_trait::async_trait]
impl Generator for OpenAiGenerator {
    async fn summarize(&self, items: &[Item], topic: &str) -> Result<String> {
        if items.is_empty() {
            return Ok(EMPTY_INPUT_TEXT.to_string());
        }
        let system = system_prompt(topic);
        let user = user_prompt(items, topic);
        let started = Instant::now();
        let res = self.chat(&system, &user).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let usage = res.as_ref().map(|(_, u)| *u).unwrap_or_default();
        let cost_usd = self
            .pricing
            .cost(&self.model, usage.prompt_tokens, usage.completion_tokens);
        self.log.record(&RequestRecord {
            timestamp: Utc::now(),
            provider: PROVIDER.to_string(),
            model: self.model.clone(),
            topic: topic.to_string(),
            prompt_fingerprint: fingerprint(&format!("{system}\n\n{user}")),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.prompt_tokens + usage.completion_tokens,
            cost_usd,
            latency_ms,
            success: res.is_ok(),
            error: res.as_ref().err().map(|e| format!("{e:#}")),
        });
        tracing::info!(
            provider = PROVIDER,
            model = %self.model,
            items = items.len(),
            latency_ms,
            cost_usd,
            ok = res.is_ok(),
            "summary generated"
        );
        res.map(|(text, _)| text)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
