// src/generate/pricing.rs
//! USD prices per one million tokens, by model.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ModelPrice {
    pub input: f64,
    pub output: f64,
}

/// Used for models missing from the table.
pub const FALLBACK_PRICE: ModelPrice = ModelPrice {
    input: 10.0,
    output: 30.0,
};

#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    models: HashMap<String, ModelPrice>,
}

impl PricingTable {
    pub fn builtin() -> Self {
        let models = [
            ("gpt-4o", 2.50, 10.00),
            ("gpt-4o-mini", 0.15, 0.60),
            ("gpt-4.1", 2.00, 8.00),
            ("gpt-4.1-mini", 0.40, 1.60),
            ("gpt-4-turbo", 10.00, 30.00),
            ("gpt-3.5-turbo", 0.50, 1.50),
        ]
        .into_iter()
        .map(|(m, input, output)| (m.to_string(), ModelPrice { input, output }))
        .collect();
        Self { models }
    }

    /// JSON object `model -> {"input": .., "output": ..}`, layered over the
    /// built-in table.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading pricing from {}", path.display()))?;
        let extra: HashMap<String, ModelPrice> =
            serde_json::from_str(&raw).context("parsing pricing json")?;
        let mut table = Self::builtin();
        table.models.extend(extra);
        Ok(table)
    }

    pub fn price_for(&self, model: &str) -> ModelPrice {
        self.models.get(model).copied().unwrap_or(FALLBACK_PRICE)
    }

    pub fn cost(&self, model: &str, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        let p = self.price_for(model);
        (prompt_tokens as f64 * p.input + completion_tokens as f64 * p.output) / 1_000_000.0
    }
}
