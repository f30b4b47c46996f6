// src/storage.rs
//! Output artifacts. Every write replaces the whole file (tmp + rename).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::info;

use crate::config::orchestrator::{OrchestratorConfig, ANALYSIS_FILE_NAME, NEWS_FILE_NAME};
use crate::ingest::types::NewsItem;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    news_path: PathBuf,
    analysis_path: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            news_path: dir.join(NEWS_FILE_NAME),
            analysis_path: dir.join(ANALYSIS_FILE_NAME),
        }
    }

    pub fn from_config(cfg: &OrchestratorConfig) -> Self {
        Self {
            news_path: cfg.news_path(),
            analysis_path: cfg.analysis_path(),
        }
    }

    pub fn news_path(&self) -> &Path {
        &self.news_path
    }

    pub fn analysis_path(&self) -> &Path {
        &self.analysis_path
    }

    pub async fn write_news(&self, items: &[NewsItem]) -> Result<()> {
        let json = serde_json::to_vec_pretty(items).context("serializing news items")?;
        write_atomic(&self.news_path, &json).await?;
        info!(path = %self.news_path.display(), count = items.len(), "news artifact written");
        Ok(())
    }

    pub async fn write_analysis(&self, text: &str) -> Result<()> {
        write_atomic(&self.analysis_path, text.as_bytes()).await?;
        info!(path = %self.analysis_path.display(), bytes = text.len(), "analysis artifact written");
        Ok(())
    }

    /// Saved news items, or `None` when no run has written the file yet.
    pub async fn load_news(&self) -> Result<Option<Vec<NewsItem>>> {
        let bytes = match fs::read(&self.news_path).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.news_path.display()))
            }
        };
        let items = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing {}", self.news_path.display()))?;
        Ok(Some(items))
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    let tmp = staging_path(path);
    fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e).with_context(|| format!("replacing {}", path.display()));
    }
    Ok(())
}

/// `<file>.<pid>.<n>.tmp`, unique per write so overlapping runs never share
/// a staging file.
fn staging_path(path: &Path) -> PathBuf {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{}.{n}.tmp", std::process::id()));
    PathBuf::from(tmp)
}
