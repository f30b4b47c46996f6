//! Re-summarize the last saved news file without touching the sources.

use crypto_news_digest::{OrchestratorConfig, Orchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    crypto_news_digest::init_tracing();

    let cfg = OrchestratorConfig::load()?;
    let report = Orchestrator::from_config(&cfg)?.analyze_saved().await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
