// src/pipeline.rs
//! End-to-end orchestration of one batch run:
//! fetch all sources -> merge -> freshness filter -> persist raw ->
//! corpus -> chunk -> gated summarize -> persist analysis -> report.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analyze::chunker::{chunk_text_with_mode, ChunkMode};
use crate::analyze::gate::ConcurrencyGate;
use crate::analyze::summarizer::{build_summarizer, DynSummarizer};
use crate::analyze::{render_analysis, summarize_all};
use crate::config::orchestrator::OrchestratorConfig;
use crate::ingest::fetcher::{NewsFetcher, RetryingFetcher};
use crate::ingest::freshness::{Clock, SystemClock};
use crate::ingest::types::NewsItem;
use crate::ingest::{fetch_all, filter_fresh, merge_outcomes};
use crate::metrics::{
    ensure_metrics_described, CHUNKS_TOTAL, ITEMS_FRESH_TOTAL, ITEMS_MERGED_TOTAL,
    PIPELINE_LAST_RUN_TS,
};
use crate::storage::ArtifactStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Merging,
    Filtering,
    PersistingRaw,
    Chunking,
    Summarizing,
    PersistingDerived,
    Done,
}

/// `analyze_saved` was asked to work before any run persisted news.
#[derive(Debug, thiserror::Error)]
#[error("no saved news at {}", .0.display())]
pub struct NoSavedNews(pub PathBuf);

/// Response body of one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrchestrationReport {
    pub message: String,
    pub count: usize,
    pub summary_chunks: Vec<String>,
    /// Sources that contributed nothing because they were down or malformed.
    #[serde(default)]
    pub degraded_sources: Vec<String>,
}

pub struct Orchestrator {
    sources: Vec<String>,
    chunk_max_length: usize,
    chunk_mode: ChunkMode,
    fetcher: Arc<dyn NewsFetcher>,
    summarizer: DynSummarizer,
    store: ArtifactStore,
    clock: Arc<dyn Clock>,
}

fn enter(stage: Stage) {
    tracing::debug!(?stage, "stage");
}

/// Join the non-empty `content` of every item with a blank line, order preserved.
pub fn build_corpus(items: &[NewsItem]) -> String {
    items
        .iter()
        .filter(|it| !it.content.is_empty())
        .map(|it| it.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

impl Orchestrator {
    /// Production wiring: HTTP sources, the configured backend and one
    /// concurrency gate that lives as long as the orchestrator.
    pub fn from_config(cfg: &OrchestratorConfig) -> Result<Self> {
        let fetcher = RetryingFetcher::http(
            cfg.fetch_retries,
            Duration::from_secs(cfg.fetch_retry_delay_secs),
            Duration::from_secs(cfg.fetch_timeout_secs),
        )?;
        let gate = ConcurrencyGate::new(cfg.summarize_concurrency);
        let summarizer = build_summarizer(cfg, gate)?;
        Ok(Self::new(cfg, Arc::new(fetcher), summarizer))
    }

    pub fn new(
        cfg: &OrchestratorConfig,
        fetcher: Arc<dyn NewsFetcher>,
        summarizer: DynSummarizer,
    ) -> Self {
        Self {
            sources: cfg.sources.clone(),
            chunk_max_length: cfg.chunk_max_length,
            chunk_mode: cfg.chunk_mode,
            fetcher,
            summarizer,
            store: ArtifactStore::from_config(cfg),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// One full run. Source and backend failures degrade in place; only local
    /// I/O (writing the artifacts) fails the run.
    pub async fn run(&self) -> Result<OrchestrationReport> {
        ensure_metrics_described();
        let t0 = std::time::Instant::now();
        info!(sources = self.sources.len(), "news run started");

        enter(Stage::Fetching);
        let outcomes = fetch_all(self.fetcher.as_ref(), &self.sources).await;

        enter(Stage::Merging);
        let merged = merge_outcomes(&self.sources, outcomes);
        counter!(ITEMS_MERGED_TOTAL).increment(merged.items.len() as u64);
        if !merged.degraded_sources.is_empty() {
            warn!(degraded = ?merged.degraded_sources, "some sources contributed no items");
        }

        enter(Stage::Filtering);
        let merged_count = merged.items.len();
        let fresh = filter_fresh(merged.items, self.clock.as_ref());
        counter!(ITEMS_FRESH_TOTAL).increment(fresh.len() as u64);
        info!(merged = merged_count, fresh = fresh.len(), "items filtered to today");

        enter(Stage::PersistingRaw);
        self.store.write_news(&fresh).await?;

        let summary_chunks = self.summarize_and_persist(&fresh).await?;

        enter(Stage::Done);
        gauge!(PIPELINE_LAST_RUN_TS).set(self.clock.now().timestamp() as f64);
        info!(
            count = fresh.len(),
            chunks = summary_chunks.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "news run finished"
        );

        Ok(OrchestrationReport {
            message: report_message(fresh.len(), summary_chunks.len()),
            count: fresh.len(),
            summary_chunks,
            degraded_sources: merged.degraded_sources,
        })
    }

    /// Re-run the analysis over the last saved news file without fetching.
    pub async fn analyze_saved(&self) -> Result<OrchestrationReport> {
        ensure_metrics_described();
        let Some(items) = self.store.load_news().await? else {
            return Err(NoSavedNews(self.store.news_path().to_path_buf()).into());
        };
        info!(count = items.len(), "re-analysing saved news");

        let summary_chunks = self.summarize_and_persist(&items).await?;
        Ok(OrchestrationReport {
            message: report_message(items.len(), summary_chunks.len()),
            count: items.len(),
            summary_chunks,
            degraded_sources: Vec::new(),
        })
    }

    async fn summarize_and_persist(&self, items: &[NewsItem]) -> Result<Vec<String>> {
        enter(Stage::Chunking);
        let corpus = build_corpus(items);
        let chunks = chunk_text_with_mode(&corpus, self.chunk_max_length, self.chunk_mode);
        counter!(CHUNKS_TOTAL).increment(chunks.len() as u64);
        info!(
            corpus_chars = corpus.chars().count(),
            chunks = chunks.len(),
            max_length = self.chunk_max_length,
            "corpus chunked"
        );

        enter(Stage::Summarizing);
        let summaries = summarize_all(self.summarizer.as_ref(), &chunks).await;

        enter(Stage::PersistingDerived);
        self.store.write_analysis(&render_analysis(&summaries)).await?;
        Ok(summaries)
    }
}

fn report_message(count: usize, chunks: usize) -> String {
    if chunks == 0 {
        format!("Saved {count} news items")
    } else {
        format!("Saved {count} news items and {chunks} chunk summaries")
    }
}
