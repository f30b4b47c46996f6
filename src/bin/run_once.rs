//! One orchestration run from the command line; prints the report as JSON.

use crypto_news_digest::{OrchestratorConfig, Orchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    crypto_news_digest::init_tracing();

    let cfg = OrchestratorConfig::load()?;
    let orchestrator = Orchestrator::from_config(&cfg)?;
    let report = match cfg.run_timeout_secs {
        Some(secs) => {
            tokio::time::timeout(std::time::Duration::from_secs(secs), orchestrator.run())
                .await
                .map_err(|_| anyhow::anyhow!("run exceeded {secs}s"))??
        }
        None => orchestrator.run().await?,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
