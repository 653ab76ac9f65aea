// src/notify/mod.rs
pub mod slack;

use anyhow::Result;

use crate::model::Digest;

pub use slack::SlackNotifier;

/// Where finished digests are announced. Failures are reported to the
/// orchestrator, which downgrades them to warnings.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, digest: &Digest) -> Result<()>;
    fn name(&self) -> &'static str;
}
