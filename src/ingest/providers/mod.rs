// src/ingest/providers/mod.rs
//! Concrete providers and the registry the pipeline pulls them from.

pub mod hackernews;
pub mod mock;
pub mod reddit;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use crate::config::AppConfig;
use crate::ingest::types::NewsProvider;

pub use hackernews::HackerNewsProvider;
pub use mock::MockRedditProvider;
pub use reddit::RedditProvider;

/// Providers in registration order. That order is the dedup tie-break, so it
/// is fixed once at start-up.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn NewsProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider under its `name()`. Re-registering a name replaces the
    /// provider but keeps its original slot.
    pub fn register(&mut self, provider: Arc<dyn NewsProvider>) -> &mut Self {
        let name = provider.name();
        if let Some(slot) = self.providers.iter_mut().find(|p| p.name() == name) {
            *slot = provider;
        } else {
            self.providers.push(provider);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn NewsProvider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Registered providers listed in `names`, in registration order.
    pub fn active(&self, names: &[String]) -> Vec<Arc<dyn NewsProvider>> {
        for n in names {
            if !self.providers.iter().any(|p| p.name().eq_ignore_ascii_case(n)) {
                warn!(provider = %n, "unknown provider in active list; ignored");
            }
        }
        self.providers
            .iter()
            .filter(|p| names.iter().any(|n| n.eq_ignore_ascii_case(p.name())))
            .cloned()
            .collect()
    }

    /// Standard wiring: `reddit` (real or mock) first, then `hackernews`.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.reddit.user_agent.clone())
            .connect_timeout(std::time::Duration::from_secs(5))
            .timeout(cfg.http_timeout)
            .build()
            .context("building http client")?;

        let mut reg = Self::new();
        if cfg.use_mock_data {
            reg.register(Arc::new(MockRedditProvider::new()));
        } else {
            reg.register(Arc::new(RedditProvider::new(http.clone(), cfg.reddit.clone())));
        }
        reg.register(Arc::new(HackerNewsProvider::new(http)));
        Ok(reg)
    }
}
