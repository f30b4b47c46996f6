// src/ingest/fetcher.rs
//! Per-source JSON fetch with bounded retries and a fixed delay between attempts.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use metrics::counter;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::ingest::types::FetchOutcome;
use crate::metrics::{FETCH_ATTEMPTS_TOTAL, FETCH_FAILURES_TOTAL, SOURCES_DEGRADED_TOTAL};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid JSON body: {0}")]
    Decode(String),
}

/// One GET returning a parsed JSON body. Separated from the retry loop so tests
/// can count attempts without a network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError>;
}

/// Anything that turns a source URL into a `FetchOutcome` without failing.
#[async_trait]
pub trait NewsFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchOutcome;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// `timeout` bounds a single attempt; it must cover the slowest upstream.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("crypto-news-digest/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("building source http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

pub struct RetryingFetcher<T> {
    transport: T,
    retries: u32,
    delay: Duration,
}

impl<T: Transport> RetryingFetcher<T> {
    /// `retries` is the total number of attempts (at least one is always made).
    pub fn new(transport: T, retries: u32, delay: Duration) -> Self {
        Self {
            transport,
            retries: retries.max(1),
            delay,
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }
}

impl RetryingFetcher<HttpTransport> {
    pub fn http(retries: u32, delay: Duration, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self::new(HttpTransport::new(timeout)?, retries, delay))
    }
}

#[async_trait]
impl<T: Transport> NewsFetcher for RetryingFetcher<T> {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        let mut last_error = String::new();

        for attempt in 1..=self.retries {
            counter!(FETCH_ATTEMPTS_TOTAL).increment(1);
            match self.transport.get_json(url).await {
                Ok(body) => {
                    debug!(url = %url, attempt, "source fetched");
                    return FetchOutcome::Fetched { body };
                }
                Err(e) => {
                    counter!(FETCH_FAILURES_TOTAL).increment(1);
                    warn!(url = %url, attempt, max = self.retries, error = %e, "source fetch attempt failed");
                    last_error = e.to_string();
                    if attempt < self.retries {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }

        counter!(SOURCES_DEGRADED_TOTAL).increment(1);
        error!(url = %url, attempts = self.retries, error = %last_error, "source exhausted retries; contributing zero items");
        FetchOutcome::Degraded {
            attempts: self.retries,
            reason: last_error,
        }
    }
}
