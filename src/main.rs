//! Crypto news digest service: binary entrypoint.
//! Boots the Axum HTTP server with the orchestrator as shared state.

use shuttle_axum::ShuttleAxum;
use tracing::{info, warn};

use crypto_news_digest::api::{self, AppState};
use crypto_news_digest::config::OrchestratorConfig;
use crypto_news_digest::metrics::Metrics;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    crypto_news_digest::init_tracing();

    let cfg = OrchestratorConfig::load()?;
    info!(
        sources = cfg.sources.len(),
        backend = %cfg.backend_url,
        model = %cfg.model,
        concurrency = cfg.summarize_concurrency,
        "orchestrator config loaded"
    );

    let state = AppState::from_config(&cfg)?;
    let mut router = api::create_router(state);

    match Metrics::init() {
        Ok(metrics) => router = router.merge(metrics.router()),
        Err(e) => warn!(error = %e, "prometheus recorder not installed; /metrics disabled"),
    }

    Ok(router.into())
}
