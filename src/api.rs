use std::sync::Arc;
use std::time::Duration;

use shuttle_axum::axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;

use crate::config::orchestrator::OrchestratorConfig;
use crate::pipeline::{NoSavedNews, OrchestrationReport, Orchestrator};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Upper bound for one run triggered over HTTP; `None` waits as long as it takes.
    pub run_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            run_timeout: None,
        }
    }

    pub fn from_config(cfg: &OrchestratorConfig) -> anyhow::Result<Self> {
        Ok(Self {
            orchestrator: Arc::new(Orchestrator::from_config(cfg)?),
            run_timeout: cfg.run_timeout_secs.map(Duration::from_secs),
        })
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/get_crypto_news", get(get_crypto_news))
        .route("/analyze_saved", get(analyze_saved))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

pub fn router(state: AppState) -> Router {
    create_router(state)
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, msg: String) -> Response {
    (status, Json(ErrorBody { error: msg })).into_response()
}

fn report_response(res: anyhow::Result<OrchestrationReport>) -> Response {
    match res {
        Ok(report) => Json(report).into_response(),
        Err(e) if e.downcast_ref::<NoSavedNews>().is_some() => {
            error_response(StatusCode::NOT_FOUND, e.to_string())
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "run failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
        }
    }
}

async fn get_crypto_news(State(state): State<AppState>) -> Response {
    let run = state.orchestrator.run();
    match state.run_timeout {
        Some(limit) => match tokio::time::timeout(limit, run).await {
            Ok(res) => report_response(res),
            Err(_) => {
                error!(timeout_secs = limit.as_secs(), "run timed out");
                error_response(
                    StatusCode::GATEWAY_TIMEOUT,
                    format!("run exceeded {}s", limit.as_secs()),
                )
            }
        },
        None => report_response(run.await),
    }
}

async fn analyze_saved(State(state): State<AppState>) -> Response {
    report_response(state.orchestrator.analyze_saved().await)
}
