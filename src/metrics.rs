use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const FETCH_ATTEMPTS_TOTAL: &str = "news_fetch_attempts_total";
pub const FETCH_FAILURES_TOTAL: &str = "news_fetch_failures_total";
pub const SOURCES_DEGRADED_TOTAL: &str = "news_sources_degraded_total";
pub const ITEMS_MERGED_TOTAL: &str = "news_items_merged_total";
pub const ITEMS_FRESH_TOTAL: &str = "news_items_fresh_total";
pub const CHUNKS_TOTAL: &str = "news_chunks_total";
pub const SUMMARIES_FAILED_TOTAL: &str = "news_summaries_failed_total";
pub const SUMMARIZE_MS: &str = "news_summarize_ms";
pub const PIPELINE_LAST_RUN_TS: &str = "news_pipeline_last_run_ts";

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(FETCH_ATTEMPTS_TOTAL, "Source fetch attempts, retries included.");
        describe_counter!(FETCH_FAILURES_TOTAL, "Source fetch attempts that failed.");
        describe_counter!(
            SOURCES_DEGRADED_TOTAL,
            "Sources that contributed zero items (exhausted or malformed)."
        );
        describe_counter!(ITEMS_MERGED_TOTAL, "Items merged across all sources.");
        describe_counter!(ITEMS_FRESH_TOTAL, "Items kept by the freshness filter.");
        describe_counter!(CHUNKS_TOTAL, "Corpus chunks sent to the generation backend.");
        describe_counter!(
            SUMMARIES_FAILED_TOTAL,
            "Chunks whose summary is an inline error string."
        );
        describe_histogram!(SUMMARIZE_MS, "Backend call time per chunk in milliseconds.");
        describe_gauge!(PIPELINE_LAST_RUN_TS, "Unix ts when the pipeline last finished.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
