//! topic-digest: fetch, rank and summarize the last 24 hours of posts for a topic.
//!
//! Configuration comes from the environment (and `.env`); see `AppConfig`.
//! The markdown digest goes to stdout, logs go to stderr.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use topic_digest::generate::{self, RequestLog};
use topic_digest::metrics::Metrics;
use topic_digest::notify::SlackNotifier;
use topic_digest::store::{MemoryStore, TomlTopicStore, TopicStore};
use topic_digest::{AppConfig, DigestPipeline, ProviderRegistry};

#[derive(Debug, Parser)]
#[command(name = "topic-digest", version, about)]
struct Args {
    /// Topic name as defined in the topics file.
    #[arg(default_value = "AI")]
    topic: String,

    /// Serve Prometheus metrics on this address while running.
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,

    /// Print the configured topic names and exit.
    #[arg(long)]
    list_topics: bool,

    /// Print aggregated LLM request-log statistics and exit.
    #[arg(long)]
    llm_stats: bool,
}

/// `RUST_LOG` wins; otherwise `LOG_LEVEL` (default `info`). `LOG_FORMAT=json`
/// switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()))
    });
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; missing file is fine.
    let _ = dotenvy::dotenv();
    init_tracing();

    let args = Args::parse();
    let cfg = AppConfig::from_env();

    if args.llm_stats {
        let log = RequestLog::new(cfg.llm.log_path.clone(), cfg.llm.log_enabled);
        println!("{}", serde_json::to_string_pretty(&log.stats()?)?);
        return Ok(());
    }

    let topics = Arc::new(TomlTopicStore::load(&cfg.topics_path)?);
    if args.list_topics {
        for name in topics.list_topic_names().await? {
            println!("{name}");
        }
        return Ok(());
    }

    if let Some(addr) = args.metrics_addr {
        let metrics = Metrics::init()?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding metrics listener on {addr}"))?;
        let app = metrics.router();
        info!(%addr, "serving /metrics");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                warn!(error = ?e, "metrics server stopped");
            }
        });
    }

    let store = Arc::new(MemoryStore::new());
    let registry = ProviderRegistry::from_config(&cfg)?;
    let providers = registry.active(&cfg.active_providers);
    info!(
        providers = ?providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
        max_items = ?cfg.selection.max_items,
        "providers active"
    );

    let generator = generate::from_config(&cfg.llm)?;
    let mut pipeline =
        DigestPipeline::new(topics, providers, store.clone(), store, generator, cfg.selection.clone());
    if let Some(slack) = SlackNotifier::from_config(&cfg.slack)? {
        pipeline = pipeline.with_notifier(Arc::new(slack));
    }

    let run = tokio::select! {
        res = pipeline.run(&args.topic) => res?,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted; run abandoned, nothing saved");
            return Ok(());
        }
    };

    for w in &run.warnings {
        warn!(warning = %w, "run finished with a warning");
    }
    info!(
        fetched = run.fetched,
        unique = run.unique,
        selected = run.digest.sources.len(),
        discarded = run.discarded.len(),
        "done"
    );
    println!("{}", run.digest.markdown);
    Ok(())
}
