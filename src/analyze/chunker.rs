// src/analyze/chunker.rs
//! Paragraph-aligned chunking of the news corpus.
//!
//! `max_length` is measured in characters. In [`ChunkMode::Soft`] it is a
//! target, not a ceiling: a paragraph is never split, so a single paragraph
//! longer than `max_length` becomes its own oversized chunk. [`ChunkMode::Hard`]
//! cuts such paragraphs into `max_length`-sized pieces instead.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkMode {
    #[default]
    Soft,
    Hard,
}

impl std::str::FromStr for ChunkMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "soft" => Ok(ChunkMode::Soft),
            "hard" => Ok(ChunkMode::Hard),
            other => anyhow::bail!("unknown chunk mode: {other}"),
        }
    }
}

/// Split `text` on newlines and pack paragraphs greedily into chunks.
/// Chunks come out in source order, trimmed; empty chunks are dropped.
pub fn chunk_text(text: &str, max_length: usize) -> Vec<String> {
    chunk_text_with_mode(text, max_length, ChunkMode::Soft)
}

pub fn chunk_text_with_mode(text: &str, max_length: usize, mode: ChunkMode) -> Vec<String> {
    let max_length = max_length.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for paragraph in text.split('\n') {
        let pieces = match mode {
            ChunkMode::Soft => vec![paragraph.to_string()],
            ChunkMode::Hard => split_chars(paragraph, max_length),
        };
        for piece in pieces {
            let piece_len = piece.chars().count();
            if current_len + piece_len <= max_length {
                current.push_str(&piece);
                current.push('\n');
                current_len += piece_len + 1;
            } else {
                push_trimmed(&mut chunks, &current);
                current = piece;
                current.push('\n');
                current_len = piece_len + 1;
            }
        }
    }
    push_trimmed(&mut chunks, &current);

    chunks
}

fn push_trimmed(chunks: &mut Vec<String>, acc: &str) {
    let t = acc.trim();
    if !t.is_empty() {
        chunks.push(t.to_string());
    }
}

/// Cut a paragraph into pieces of at most `max` characters. A paragraph that
/// already fits (including the empty one) comes back unchanged.
fn split_chars(paragraph: &str, max: usize) -> Vec<String> {
    if paragraph.chars().count() <= max {
        return vec![paragraph.to_string()];
    }
    let chars: Vec<char> = paragraph.chars().collect();
    chars.chunks(max).map(|c| c.iter().collect()).collect()
}
