//! Summarizer: provider abstraction + process-wide concurrency gate.
//!
//! A [`Summarizer`] never fails. Backend and transport problems come back as
//! human-readable strings (see [`SummarizeError`]) that are stored next to the
//! genuine summaries.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tracing::{debug, warn};

use crate::analyze::gate::ConcurrencyGate;
use crate::analyze::ollama::OllamaProvider;
use crate::config::orchestrator::OrchestratorConfig;
use crate::metrics::{SUMMARIES_FAILED_TOTAL, SUMMARIZE_MS};

pub const ANALYSIS_PROMPT: &str = "Analyze the following crypto news and suggest if there are any interesting coins \
to consider investing in, based on trends, project potential, and current events:\n\n";

pub fn build_prompt(chunk: &str) -> String {
    format!("{ANALYSIS_PROMPT}{chunk}")
}

/// Failure of one backend call. `Display` is the inline result string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SummarizeError {
    #[error("HTTP error: {status} - {body}")]
    Http { status: u16, body: String },
    #[error("Request error: {0}")]
    Request(String),
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Trait object used by the pipeline (and tests).
pub trait Summarizer: Send + Sync {
    /// Summarize one chunk. Always returns a string, errors included.
    fn summarize<'a>(&'a self, chunk: &'a str) -> Pin<Box<dyn Future<Output = String> + Send + 'a>>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynSummarizer = Arc<dyn Summarizer>;

/// Low-level provider: does the *real* backend call for a full prompt.
/// Kept separate so the same gated wrapper serves production and tests.
pub trait Provider: Send + Sync + 'static {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, SummarizeError>> + Send + 'a>>;
    fn name(&self) -> &'static str;
}

/// Fixed answer for every prompt; used for local runs and tests.
#[derive(Clone)]
pub struct MockProvider {
    pub fixed: String,
}

impl Provider for MockProvider {
    fn generate<'a>(
        &'a self,
        _prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, SummarizeError>> + Send + 'a>> {
        let out = self.fixed.clone();
        Box::pin(async move { Ok(out) })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Wraps a provider so that at most `gate.capacity()` calls are in flight
/// across every clone of the gate.
pub struct LimitedSummarizer<P: Provider> {
    inner: P,
    gate: ConcurrencyGate,
}

impl<P: Provider> LimitedSummarizer<P> {
    pub fn new(inner: P, gate: ConcurrencyGate) -> Self {
        Self { inner, gate }
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    async fn summarize_impl(&self, chunk: &str) -> String {
        let _permit = match self.gate.acquire().await {
            Ok(p) => p,
            Err(e) => return SummarizeError::Unexpected(e.to_string()).to_string(),
        };

        let prompt = build_prompt(chunk);
        let t0 = Instant::now();
        let res = self.inner.generate(&prompt).await;
        histogram!(SUMMARIZE_MS).record(t0.elapsed().as_secs_f64() * 1_000.0);

        match res {
            Ok(text) => {
                debug!(provider = self.inner.name(), chars = text.len(), "chunk summarized");
                text.trim().to_string()
            }
            Err(e) => {
                counter!(SUMMARIES_FAILED_TOTAL).increment(1);
                warn!(provider = self.inner.name(), error = %e, "summarize failed; storing inline error");
                e.to_string()
            }
        }
    }
}

impl<P: Provider> Summarizer for LimitedSummarizer<P> {
    fn summarize<'a>(&'a self, chunk: &'a str) -> Pin<Box<dyn Future<Output = String> + Send + 'a>> {
        Box::pin(self.summarize_impl(chunk))
    }
    fn provider_name(&self) -> &'static str {
        self.inner.name()
    }
}

/// Factory: build the summarizer according to config and environment.
///
/// * If `LLM_TEST_MODE=mock`, returns a gated mock that answers with a fixed line.
/// * Else talks to the generation backend at `cfg.backend_url`.
pub fn build_summarizer(
    cfg: &OrchestratorConfig,
    gate: ConcurrencyGate,
) -> anyhow::Result<DynSummarizer> {
    if std::env::var("LLM_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        let mock = MockProvider {
            fixed: "Neutral outlook (mock)".to_string(),
        };
        return Ok(Arc::new(LimitedSummarizer::new(mock, gate)));
    }

    let provider = OllamaProvider::new(
        &cfg.backend_url,
        &cfg.model,
        Duration::from_secs(cfg.summarize_timeout_secs),
        Duration::from_secs(cfg.summarize_connect_timeout_secs),
    )?;
    Ok(Arc::new(LimitedSummarizer::new(provider, gate)))
}
