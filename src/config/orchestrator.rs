// src/config/orchestrator.rs
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::analyze::chunker::ChunkMode;

// --- env defaults & names ---
pub const DEFAULT_CONFIG_PATH: &str = "config/orchestrator.toml";
pub const ENV_CONFIG_PATH: &str = "NEWS_CONFIG_PATH";

pub const NEWS_FILE_NAME: &str = "crypto_news.json";
pub const ANALYSIS_FILE_NAME: &str = "crypto_news_analysis.txt";

fn default_sources() -> Vec<String> {
    vec![
        "http://service1:8000/fetch_news".to_string(),
        "http://service2:8000/fetch_news".to_string(),
        "http://service3:8000/fetch_news".to_string(),
    ]
}

/// Deployment knobs for one orchestrator process. Every field has a default;
/// a TOML file and then environment variables may override them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Upstream news-fetch services, in merge order.
    pub sources: Vec<String>,
    /// Base URL of the generation backend (`/api/generate` is appended).
    pub backend_url: String,
    pub model: String,
    /// Total attempts per source.
    pub fetch_retries: u32,
    pub fetch_retry_delay_secs: u64,
    /// Per-attempt timeout.
    pub fetch_timeout_secs: u64,
    pub chunk_max_length: usize,
    pub chunk_mode: ChunkMode,
    /// Max in-flight backend calls for the whole process.
    pub summarize_concurrency: usize,
    pub summarize_timeout_secs: u64,
    pub summarize_connect_timeout_secs: u64,
    pub output_dir: PathBuf,
    /// Optional cap on one whole run triggered over HTTP.
    pub run_timeout_secs: Option<u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            backend_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            fetch_retries: 5,
            fetch_retry_delay_secs: 5,
            fetch_timeout_secs: 180,
            chunk_max_length: 4000,
            chunk_mode: ChunkMode::Soft,
            summarize_concurrency: 3,
            summarize_timeout_secs: 600,
            summarize_connect_timeout_secs: 60,
            output_dir: PathBuf::from("received_data"),
            run_timeout_secs: None,
        }
    }
}

impl OrchestratorConfig {
    /// Defaults, then the TOML file (`$NEWS_CONFIG_PATH` or
    /// `config/orchestrator.toml` if present), then environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let path = PathBuf::from(p);
                if !path.exists() {
                    return Err(anyhow!(
                        "{ENV_CONFIG_PATH} points to non-existent path {}",
                        path.display()
                    ));
                }
                Self::load_from_file(&path)?
            }
            Err(_) => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::load_from_file(path)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_overrides(|name| std::env::var(name).ok());
        Ok(cfg)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading orchestrator config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing orchestrator config {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: Self = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Apply `NAME=value` overrides from `lookup` (the process env in production).
    /// Values that do not parse are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("NEWS_SOURCES") {
            let list: Vec<String> = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if !list.is_empty() {
                self.sources = list;
            }
        }
        if let Some(v) = lookup("OLLAMA_API").filter(|v| !v.trim().is_empty()) {
            self.backend_url = v.trim().to_string();
        }
        if let Some(v) = lookup("OLLAMA_MODEL").filter(|v| !v.trim().is_empty()) {
            self.model = v.trim().to_string();
        }
        if let Some(v) = lookup("OUTPUT_DIR").filter(|v| !v.trim().is_empty()) {
            self.output_dir = PathBuf::from(v.trim());
        }
        override_parsed(&lookup, "FETCH_RETRIES", &mut self.fetch_retries);
        override_parsed(&lookup, "FETCH_RETRY_DELAY_SECS", &mut self.fetch_retry_delay_secs);
        override_parsed(&lookup, "FETCH_TIMEOUT_SECS", &mut self.fetch_timeout_secs);
        override_parsed(&lookup, "CHUNK_MAX_LENGTH", &mut self.chunk_max_length);
        override_parsed(&lookup, "CHUNK_MODE", &mut self.chunk_mode);
        override_parsed(&lookup, "SUMMARIZE_CONCURRENCY", &mut self.summarize_concurrency);
        override_parsed(&lookup, "SUMMARIZE_TIMEOUT_SECS", &mut self.summarize_timeout_secs);
        override_parsed(
            &lookup,
            "SUMMARIZE_CONNECT_TIMEOUT_SECS",
            &mut self.summarize_connect_timeout_secs,
        );
        if let Some(v) = lookup("RUN_TIMEOUT_SECS") {
            match v.trim().parse::<u64>() {
                Ok(secs) => self.run_timeout_secs = Some(secs),
                Err(e) => warn!(var = "RUN_TIMEOUT_SECS", value = %v, error = %e, "ignoring unparseable override"),
            }
        }
        self.sanitize();
    }

    fn sanitize(&mut self) {
        self.fetch_retries = self.fetch_retries.max(1);
        self.chunk_max_length = self.chunk_max_length.max(1);
        self.summarize_concurrency = self.summarize_concurrency.max(1);
        // 0 means "no run-level timeout" in every layer.
        self.run_timeout_secs = self.run_timeout_secs.filter(|secs| *secs > 0);
    }

    pub fn news_path(&self) -> PathBuf {
        self.output_dir.join(NEWS_FILE_NAME)
    }

    pub fn analysis_path(&self) -> PathBuf {
        self.output_dir.join(ANALYSIS_FILE_NAME)
    }
}

fn override_parsed<T, F>(lookup: &F, name: &str, slot: &mut T)
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(v) => *slot = v,
        Err(e) => warn!(var = name, value = %raw, error = %e, "ignoring unparseable override"),
    }
}
