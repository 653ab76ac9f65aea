// src/generate/request_log.rs
//! Append-only JSONL log of LLM requests.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestRecord {
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    pub topic: String,
    /// SHA-256 prefix of the full prompt.
    pub prompt_fingerprint: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cost_usd: f64,
    pub latency_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RequestStats {
    pub total_requests: u64,
    pub successful: u64,
    pub failed: u64,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub avg_latency_ms: f64,
    pub by_provider: BTreeMap<String, u64>,
}

pub struct RequestLog {
    path: PathBuf,
    enabled: bool,
    lock: Mutex<()>,
}

impl RequestLog {
    pub fn new(path: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            path: path.into(),
            enabled,
            lock: Mutex::new(()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(PathBuf::new(), false)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write failures are logged, never returned; the request already happened.
    pub fn record(&self, rec: &RequestRecord) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.append(rec) {
            tracing::warn!(error = ?e, path = %self.path.display(), "request log write failed");
        }
    }

    fn append(&self, rec: &RequestRecord) -> Result<()> {
        let line = serde_json::to_string(rec)?;
        let _g = self.lock.lock().expect("request log mutex poisoned");
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        writeln!(f, "{line}")?;
        Ok(())
    }

    /// All parseable records; unreadable lines are skipped.
    pub fn records(&self) -> Result<Vec<RequestRecord>> {
        if !self.enabled || !self.path.exists() {
            return Ok(Vec::new());
        }
        let _g = self.lock.lock().expect("request log mutex poisoned");
        let f = fs::File::open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        let mut out = Vec::new();
        for line in BufReader::new(f).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RequestRecord>(&line) {
                Ok(r) => out.push(r),
                Err(e) => tracing::debug!(error = %e, "skipping malformed request log line"),
            }
        }
        Ok(out)
    }

    pub fn stats(&self) -> Result<RequestStats> {
        let records = self.records()?;
        let mut s = RequestStats::default();
        let mut latency_sum = 0u64;
        for r in &records {
            s.total_requests += 1;
            if r.success {
                s.successful += 1;
            } else {
                s.failed += 1;
            }
            s.total_tokens += r.total_tokens;
            s.total_cost_usd += r.cost_usd;
            latency_sum += r.latency_ms;
            *s.by_provider.entry(r.provider.clone()).or_default() += 1;
        }
        if s.total_requests > 0 {
            s.avg_latency_ms = latency_sum as f64 / s.total_requests as f64;
        }
        Ok(s)
    }

    pub fn clear(&self) -> Result<()> {
        if !self.enabled || !self.path.exists() {
            return Ok(());
        }
        let _g = self.lock.lock().expect("request log mutex poisoned");
        fs::write(&self.path, b"").with_context(|| format!("truncating {}", self.path.display()))
    }
}
