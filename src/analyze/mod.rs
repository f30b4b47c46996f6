// src/analyze/mod.rs
//! Corpus chunking and gated, order-preserving summarization.

pub mod chunker;
pub mod gate;
pub mod ollama;
pub mod summarizer;

use futures::future::join_all;

use crate::analyze::summarizer::Summarizer;

/// Summarize every chunk concurrently. `out[i]` is the summary of `chunks[i]`
/// however the calls finish; the gate inside the summarizer bounds load.
pub async fn summarize_all(summarizer: &dyn Summarizer, chunks: &[String]) -> Vec<String> {
    join_all(chunks.iter().map(|c| summarizer.summarize(c))).await
}

/// Human-readable analysis artifact: one labeled section per chunk.
pub fn render_analysis(summaries: &[String]) -> String {
    summaries
        .iter()
        .enumerate()
        .map(|(i, s)| format!("--- Chunk {} ---\n{}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n\n")
}
