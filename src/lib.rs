// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod generate;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod select;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::config::{AppConfig, SelectionConfig, SourceQuotas, SourceWeights};
pub use crate::ingest::providers::ProviderRegistry;
pub use crate::ingest::types::NewsProvider;
pub use crate::ingest::{fetch_all, merge};
pub use crate::model::{Digest, Item, SelectionResult, TopicDefinition};
pub use crate::pipeline::{DigestPipeline, DigestRun, PipelineError};
pub use crate::select::select;
