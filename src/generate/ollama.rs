// src/generate/ollama.rs
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::prompt::{fingerprint, system_prompt, user_prompt};
use super::request_log::{RequestLog, RequestRecord};
use super::{estimate_tokens, Generator, EMPTY_INPUT_TEXT};
use crate::model::Item;

const PROVIDER: &str = "ollama";

#[derive(Serialize)]
struct GenerateReq<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResp {
    #[serde(default)]
    response: String,
}

/// Local models through Ollama's `/api/generate`. Ollama reports no usage, so
/// tokens are estimated and cost is zero.
pub struct OllamaGenerator {
    http: reqwest::Client,
    api_url: String,
    model: String,
    log: Arc<RequestLog>,
}

impl OllamaGenerator {
    pub fn new(api_url: &str, model: &str, log: Arc<RequestLog>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(120))
            .build()
            .context("building ollama client")?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            log,
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let resp: GenerateResp = self
            .http
            .post(format!("{}/api/generate", self.api_url))
            .json(&GenerateReq {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .context("ollama request")?
            .error_for_status()
            .context("ollama non-2xx")?
            .json()
            .await
            .context("ollama json")?;
        let text = resp.response.trim();
        if text.is_empty() {
            bail!("ollama returned an empty response");
        }
        Ok(text.to_string())
    }
}

#[async_trait::async_trait]
impl Generator for OllamaGenerator {
    async fn summarize(&self, items: &[Item], topic: &str) -> Result<String> {
        if items.is_empty() {
            return Ok(EMPTY_INPUT_TEXT.to_string());
        }
        let prompt = format!("{}\n\n{}", system_prompt(topic), user_prompt(items, topic));
        let started = Instant::now();
        let res = self.generate(&prompt).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let prompt_tokens = estimate_tokens(&prompt);
        let completion_tokens = res.as_deref().map(estimate_tokens).unwrap_or(0);
        self.log.record(&RequestRecord {
            timestamp: Utc::now(),
            provider: PROVIDER.to_string(),
            model: self.model.clone(),
            topic: topic.to_string(),
            prompt_fingerprint: fingerprint(&prompt),
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            cost_usd: 0.0,
            latency_ms,
            success: res.is_ok(),
            error: res.as_ref().err().map(|e| format!("{e:#}")),
        });
        tracing::info!(
            provider = PROVIDER,
            model = %self.model,
            items = items.len(),
            latency_ms,
            ok = res.is_ok(),
            "summary generated"
        );
        res
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
