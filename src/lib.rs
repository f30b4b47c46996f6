// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod analyze;
pub mod api;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod storage;

pub use crate::api::{create_router, router, AppState};
pub use crate::config::OrchestratorConfig;
pub use crate::pipeline::{OrchestrationReport, Orchestrator};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact tracing for the binaries. `RUST_LOG` wins over the default filter;
/// an already installed subscriber (e.g. the runtime's) is left alone.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("crypto_news_digest=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}
