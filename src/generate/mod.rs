// src/generate/mod.rs
//! Markdown digest generators backed by an LLM.

pub mod ollama;
pub mod openai;
pub mod pricing;
pub mod prompt;
pub mod request_log;

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::config::{LlmBackend, LlmConfig};
use crate::model::Item;

pub use ollama::OllamaGenerator;
pub use openai::OpenAiGenerator;
pub use pricing::{ModelPrice, PricingTable};
pub use request_log::{RequestLog, RequestRecord, RequestStats};

/// Returned for an empty item list; no request is made.
pub const EMPTY_INPUT_TEXT: &str = "No news items found for this topic.";

/// Turns the selected items into a markdown digest.
#[async_trait::async_trait]
pub trait Generator: Send + Sync {
    /// `items` arrive in final rank order and are presented in that order.
    async fn summarize(&self, items: &[Item], topic: &str) -> Result<String>;
    fn provider_name(&self) -> &'static str;
    fn model_name(&self) -> &str;
}

pub type DynGenerator = Arc<dyn Generator>;

/// Pick the generator named by `LLM_PROVIDER`.
pub fn from_config(cfg: &LlmConfig) -> Result<DynGenerator> {
    let log = Arc::new(RequestLog::new(cfg.log_path.clone(), cfg.log_enabled));
    match cfg.backend {
        LlmBackend::Ollama => Ok(Arc::new(OllamaGenerator::new(
            &cfg.ollama_url,
            &cfg.ollama_model,
            log,
        )?)),
        LlmBackend::OpenAi => {
            if cfg.openai_api_key.trim().is_empty() {
                bail!("LLM_PROVIDER=openai requires OPENAI_API_KEY");
            }
            let pricing = match &cfg.pricing_path {
                Some(p) => PricingTable::load(p).unwrap_or_else(|e| {
                    tracing::warn!(error = ?e, path = %p.display(), "pricing file unusable; using built-in prices");
                    PricingTable::builtin()
                }),
                None => PricingTable::builtin(),
            };
            Ok(Arc::new(
                OpenAiGenerator::new(&cfg.openai_api_key, &cfg.openai_model, log)?
                    .with_pricing(pricing),
            ))
        }
    }
}

/// Rough token count used when the backend does not report usage.
pub(crate) fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}
