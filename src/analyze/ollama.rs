// src/analyze/ollama.rs
//! Generation backend speaking the `POST /api/generate` streaming protocol:
//! the response body is newline-delimited JSON, each line carrying an
//! incremental `response` fragment.

use std::fmt::Write as _;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::Context;
use futures::StreamExt as _;
use serde::{Deserialize, Serialize};

use crate::analyze::summarizer::{Provider, SummarizeError};

/// Prefix of the marker appended when one streamed line is not valid JSON.
pub const DECODE_ERROR_MARKER: &str = "[Decode error]";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateFragment {
    #[serde(default)]
    response: String,
}

/// Reassembles a streamed answer from raw body bytes. Lines may be split
/// across network reads; a bad line leaves a marker and decoding continues.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    pending: Vec<u8>,
    text: String,
}

impl StreamAccumulator {
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.push_line(&line[..pos]);
        }
    }

    fn push_line(&mut self, line: &[u8]) {
        let line = line.trim_ascii();
        if line.is_empty() {
            return;
        }
        match serde_json::from_slice::<GenerateFragment>(line) {
            Ok(fragment) => self.text.push_str(&fragment.response),
            Err(e) => {
                let _ = write!(self.text, "\n{DECODE_ERROR_MARKER}: {e}");
            }
        }
    }

    /// Flush a trailing unterminated line and return the trimmed text.
    pub fn finish(mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        self.push_line(&rest);
        self.text.trim().to_string()
    }
}

pub struct OllamaProvider {
    http: reqwest::Client,
    generate_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(
        base_url: &str,
        model: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("crypto-news-digest/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .context("building generation backend client")?;
        Ok(Self {
            http,
            generate_url: format!("{}/api/generate", base_url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }

    async fn generate_impl(&self, prompt: &str) -> Result<String, SummarizeError> {
        let req = GenerateRequest {
            model: &self.model,
            prompt,
            stream: true,
        };
        let resp = self
            .http
            .post(&self.generate_url)
            .json(&req)
            .send()
            .await
            .map_err(|e| SummarizeError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SummarizeError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let mut acc = StreamAccumulator::default();
        let mut body = resp.bytes_stream();
        while let Some(chunk) = body.next().await {
            let bytes = chunk.map_err(|e| SummarizeError::Request(e.to_string()))?;
            acc.push_bytes(&bytes);
        }
        Ok(acc.finish())
    }
}

impl Provider for OllamaProvider {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, SummarizeError>> + Send + 'a>> {
        Box::pin(self.generate_impl(prompt))
    }
    fn name(&self) -> &'static str {
        "ollama"
    }
}
