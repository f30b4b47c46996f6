// tests/orchestrator_e2e.rs
//
// Full runs against local Axum servers standing in for the news sources and
// the generation backend. Only 127.0.0.1 sockets, no external network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crypto_news_digest::analyze::gate::ConcurrencyGate;
use crypto_news_digest::analyze::ollama::OllamaProvider;
use crypto_news_digest::analyze::summarizer::{DynSummarizer, LimitedSummarizer, MockProvider};
use crypto_news_digest::config::OrchestratorConfig;
use crypto_news_digest::ingest::fetcher::RetryingFetcher;
use crypto_news_digest::ingest::freshness::FixedClock;
use crypto_news_digest::ingest::types::{NewsItem, SourceReply};
use crypto_news_digest::pipeline::{NoSavedNews, Orchestrator};

const TODAY: &str = "Mon, 28 Jul 2025 09:15:00 +0000";
const YESTERDAY: &str = "Sun, 27 Jul 2025 18:40:00 +0000";
const NOW: &str = "2025-07-28T12:00:00Z";

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{addr}")
}

fn item(n: usize, when: &str, content: &str, published: &str) -> NewsItem {
    NewsItem {
        title: format!("s{n} {when}"),
        content: content.to_string(),
        link: format!("https://news.example/{n}/{when}"),
        published: published.to_string(),
        source: format!("service{n}"),
    }
}

fn source_reply(n: usize, contents: [&str; 2]) -> SourceReply {
    SourceReply {
        count: Some(2),
        items: vec![
            item(n, "today", contents[0], TODAY),
            item(n, "yesterday", contents[1], YESTERDAY),
        ],
    }
}

/// Three healthy sources, one that always 500s and one with a malformed body.
async fn spawn_sources(today_contents: [&'static str; 3]) -> String {
    let router = Router::new()
        .route(
            "/s1/fetch_news",
            get(move || async move { Json(source_reply(1, [today_contents[0], "old news one"])) }),
        )
        .route(
            "/s2/fetch_news",
            get(move || async move { Json(source_reply(2, [today_contents[1], "old news two"])) }),
        )
        .route(
            "/s3/fetch_news",
            get(move || async move { Json(source_reply(3, [today_contents[2], "old news three"])) }),
        )
        .route(
            "/down/fetch_news",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "scraper crashed") }),
        )
        .route(
            "/malformed/fetch_news",
            get(|| async { Json(json!({ "items": "not a list" })) }),
        );
    spawn(router).await
}

#[derive(Clone, Default)]
struct Backend {
    calls: Arc<AtomicUsize>,
}

/// NDJSON stream in small byte pieces so lines straddle reads. A chunk
/// containing `FAIL` gets a 500 instead.
async fn generate(State(backend): State<Backend>, Json(req): Json<Value>) -> Response {
    backend.calls.fetch_add(1, Ordering::SeqCst);
    let prompt = req["prompt"].as_str().unwrap_or_default();
    let chunk = prompt.lines().last().unwrap_or_default().to_string();
    if chunk.contains("FAIL") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "model crashed").into_response();
    }

    let mut ndjson = String::new();
    for fragment in ["Summary of ", chunk.as_str()] {
        ndjson.push_str(&json!({ "model": "llama3", "response": fragment, "done": false }).to_string());
        ndjson.push('\n');
    }
    ndjson.push_str(&json!({ "model": "llama3", "response": "", "done": true }).to_string());
    ndjson.push('\n');

    let pieces: Vec<Result<Vec<u8>, std::io::Error>> = ndjson
        .into_bytes()
        .chunks(7)
        .map(|c| Ok(c.to_vec()))
        .collect();
    Response::new(Body::from_stream(futures::stream::iter(pieces)))
}

async fn spawn_backend() -> (String, Backend) {
    let backend = Backend::default();
    let router = Router::new()
        .route("/api/generate", post(generate))
        .with_state(backend.clone());
    (spawn(router).await, backend)
}

fn config(sources: Vec<String>, backend_url: &str, out: &std::path::Path) -> OrchestratorConfig {
    OrchestratorConfig {
        sources,
        backend_url: backend_url.to_string(),
        chunk_max_length: 40,
        summarize_concurrency: 2,
        output_dir: out.to_path_buf(),
        ..Default::default()
    }
}

fn orchestrator(cfg: &OrchestratorConfig) -> Orchestrator {
    let fetcher = RetryingFetcher::http(1, Duration::ZERO, Duration::from_secs(5)).expect("client");
    let provider = OllamaProvider::new(
        &cfg.backend_url,
        &cfg.model,
        Duration::from_secs(5),
        Duration::from_secs(5),
    )
    .expect("backend client");
    let summarizer: DynSummarizer = Arc::new(LimitedSummarizer::new(
        provider,
        ConcurrencyGate::new(cfg.summarize_concurrency),
    ));
    Orchestrator::new(cfg, Arc::new(fetcher), summarizer)
        .with_clock(Arc::new(FixedClock::from_rfc3339(NOW).expect("clock")))
}

fn read_news(cfg: &OrchestratorConfig) -> Vec<NewsItem> {
    let raw = std::fs::read_to_string(cfg.news_path()).expect("news artifact");
    serde_json::from_str(&raw).expect("news artifact is a JSON list")
}

#[tokio::test]
async fn three_sources_merge_filter_chunk_and_summarize() {
    let sources = spawn_sources([
        "Bitcoin ETF inflows hit a record high",
        "Ethereum devs schedule the next upgrade",
        "Solana fees drop after validator patch",
    ])
    .await;
    let (backend_url, backend) = spawn_backend().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = config(
        (1..=3).map(|n| format!("{sources}/s{n}/fetch_news")).collect(),
        &backend_url,
        dir.path(),
    );

    let report = orchestrator(&cfg).run().await.expect("run succeeds");

    assert_eq!(report.count, 3, "6 merged, 3 published today");
    assert!(report.degraded_sources.is_empty());
    assert_eq!(
        report.summary_chunks,
        vec![
            "Summary of Bitcoin ETF inflows hit a record high",
            "Summary of Ethereum devs schedule the next upgrade",
            "Summary of Solana fees drop after validator patch",
        ]
    );
    assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    assert!(report.message.contains('3'), "{}", report.message);

    let saved = read_news(&cfg);
    let titles: Vec<&str> = saved.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["s1 today", "s2 today", "s3 today"]);
    assert!(saved.iter().all(|i| i.published == TODAY));

    let analysis = std::fs::read_to_string(cfg.analysis_path()).expect("analysis artifact");
    assert_eq!(analysis.matches("--- Chunk ").count(), 3);
    let p1 = analysis.find("--- Chunk 1 ---").expect("section 1");
    let p2 = analysis.find("--- Chunk 2 ---").expect("section 2");
    let p3 = analysis.find("--- Chunk 3 ---").expect("section 3");
    assert!(p1 < p2 && p2 < p3);
    assert!(analysis[p1..p2].contains("Bitcoin ETF"));
    assert!(analysis[p3..].contains("Solana fees"));
}

#[tokio::test]
async fn backend_failure_on_one_chunk_stays_inline() {
    let sources = spawn_sources([
        "Cardano governance vote passes",
        "FAIL this one on purpose please",
        "Chainlink adds new price feeds",
    ])
    .await;
    let (backend_url, _backend) = spawn_backend().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = config(
        (1..=3).map(|n| format!("{sources}/s{n}/fetch_news")).collect(),
        &backend_url,
        dir.path(),
    );

    let report = orchestrator(&cfg).run().await.expect("run succeeds");

    assert_eq!(report.summary_chunks.len(), 3);
    assert_eq!(report.summary_chunks[0], "Summary of Cardano governance vote passes");
    assert_eq!(report.summary_chunks[1], "HTTP error: 500 - model crashed");
    assert_eq!(report.summary_chunks[2], "Summary of Chainlink adds new price feeds");

    let analysis = std::fs::read_to_string(cfg.analysis_path()).expect("analysis artifact");
    assert!(analysis.contains("--- Chunk 2 ---\nHTTP error: 500 - model crashed"));
}

#[tokio::test]
async fn unreachable_backend_is_a_request_error_per_chunk() {
    let sources = spawn_sources(["one", "two", "three"]).await;
    // Bind then drop a listener to get a port nobody answers on.
    let dead = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        format!("http://{}", l.local_addr().expect("addr"))
    };
    let dir = tempfile::tempdir().expect("tempdir");
    let mut cfg = config(vec![format!("{sources}/s1/fetch_news")], &dead, dir.path());
    cfg.chunk_max_length = 4000;

    let report = orchestrator(&cfg).run().await.expect("run succeeds");

    assert_eq!(report.count, 1);
    assert_eq!(report.summary_chunks.len(), 1);
    assert!(
        report.summary_chunks[0].starts_with("Request error: "),
        "{}",
        report.summary_chunks[0]
    );
}

#[tokio::test]
async fn down_and_malformed_sources_degrade_to_zero_items() {
    let sources = spawn_sources(["Polkadot parachain auction", "x", "y"]).await;
    let (backend_url, _backend) = spawn_backend().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let down = format!("{sources}/down/fetch_news");
    let malformed = format!("{sources}/malformed/fetch_news");
    let cfg = config(
        vec![down.clone(), format!("{sources}/s1/fetch_news"), malformed.clone()],
        &backend_url,
        dir.path(),
    );

    let report = orchestrator(&cfg).run().await.expect("run succeeds");

    assert_eq!(report.count, 1);
    assert_eq!(report.degraded_sources, vec![down, malformed]);
    assert_eq!(report.summary_chunks, vec!["Summary of Polkadot parachain auction"]);
}

#[tokio::test]
async fn no_fresh_news_still_persists_empty_artifacts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sources = spawn_sources(["a", "b", "c"]).await;
    let cfg = config(
        vec![format!("{sources}/down/fetch_news")],
        "http://127.0.0.1:9",
        dir.path(),
    );
    let summarizer: DynSummarizer = Arc::new(LimitedSummarizer::new(
        MockProvider {
            fixed: "unused".into(),
        },
        ConcurrencyGate::new(1),
    ));
    let fetcher = RetryingFetcher::http(2, Duration::from_millis(10), Duration::from_secs(5))
        .expect("client");
    let orch = Orchestrator::new(&cfg, Arc::new(fetcher), summarizer)
        .with_clock(Arc::new(FixedClock::from_rfc3339(NOW).expect("clock")));

    let report = orch.run().await.expect("run succeeds");

    assert_eq!(report.count, 0);
    assert!(report.summary_chunks.is_empty());
    assert_eq!(report.degraded_sources.len(), 1);
    assert!(read_news(&cfg).is_empty());
    assert_eq!(std::fs::read_to_string(cfg.analysis_path()).expect("analysis"), "");
}

#[tokio::test]
async fn analyze_saved_reuses_the_last_news_file() {
    let sources = spawn_sources([
        "Arbitrum airdrop claims open",
        "Litecoin hashrate climbs",
        "Tron stablecoin volume grows",
    ])
    .await;
    let (backend_url, backend) = spawn_backend().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = config(
        (1..=3).map(|n| format!("{sources}/s{n}/fetch_news")).collect(),
        &backend_url,
        dir.path(),
    );
    let orch = orchestrator(&cfg);

    let missing = orch.analyze_saved().await.expect_err("nothing saved yet");
    assert!(missing.downcast_ref::<NoSavedNews>().is_some());

    let first = orch.run().await.expect("run succeeds");
    std::fs::remove_file(cfg.analysis_path()).expect("drop analysis");

    let again = orch.analyze_saved().await.expect("re-analysis succeeds");
    assert_eq!(again.count, first.count);
    assert_eq!(again.summary_chunks, first.summary_chunks);
    assert!(cfg.analysis_path().exists());
    assert_eq!(backend.calls.load(Ordering::SeqCst), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_runs_on_one_store_all_succeed() {
    let sources = spawn_sources([
        "Bitcoin miners rotate into AI hosting",
        "Ether staking queue shrinks",
        "Avalanche subnet goes live",
    ])
    .await;
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = config(
        (1..=3).map(|n| format!("{sources}/s{n}/fetch_news")).collect(),
        "http://127.0.0.1:9",
        dir.path(),
    );
    let summarizer: DynSummarizer = Arc::new(LimitedSummarizer::new(
        MockProvider {
            fixed: "Neutral outlook".into(),
        },
        ConcurrencyGate::new(cfg.summarize_concurrency),
    ));
    let fetcher = RetryingFetcher::http(1, Duration::ZERO, Duration::from_secs(5)).expect("client");
    let orch = Arc::new(
        Orchestrator::new(&cfg, Arc::new(fetcher), summarizer)
            .with_clock(Arc::new(FixedClock::from_rfc3339(NOW).expect("clock"))),
    );

    let runs: Vec<_> = (0..8)
        .map(|_| {
            let orch = orch.clone();
            tokio::spawn(async move { orch.run().await })
        })
        .collect();
    for run in runs {
        let report = run.await.expect("join").expect("every overlapping run succeeds");
        assert_eq!(report.count, 3);
    }

    assert_eq!(read_news(&cfg).len(), 3);
    let analysis = std::fs::read_to_string(cfg.analysis_path()).expect("analysis artifact");
    assert_eq!(analysis.matches("--- Chunk ").count(), 3);
}
