// src/ingest/mod.rs
pub mod fetcher;
pub mod freshness;
pub mod types;

use futures::future::join_all;
use metrics::counter;
use serde::de::Error as _;
use serde::Deserialize;
use serde_json::Value;

use crate::ingest::fetcher::NewsFetcher;
use crate::ingest::freshness::{is_published_today, Clock};
use crate::ingest::types::{FetchOutcome, NewsItem};
use crate::metrics::SOURCES_DEGRADED_TOTAL;

/// Items merged from every source, plus the sources that contributed nothing
/// because they were unreachable or answered with a malformed payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedBatch {
    pub items: Vec<NewsItem>,
    pub degraded_sources: Vec<String>,
}

/// Fetch every source concurrently. Results come back in `sources` order no
/// matter which source answers first; one slow source never cancels another.
pub async fn fetch_all(fetcher: &dyn NewsFetcher, sources: &[String]) -> Vec<FetchOutcome> {
    join_all(sources.iter().map(|url| fetcher.fetch(url))).await
}

/// Pull the `items` array out of a source body. A body without `items` has
/// zero items; anything else that does not decode is an error.
pub fn extract_items(body: &Value) -> Result<Vec<NewsItem>, serde_json::Error> {
    let Some(obj) = body.as_object() else {
        return Err(serde_json::Error::custom("source body is not a JSON object"));
    };
    match obj.get("items") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(items) => Vec::<NewsItem>::deserialize(items),
    }
}

/// Concatenate per-source items in source-declaration order.
pub fn merge_outcomes(sources: &[String], outcomes: Vec<FetchOutcome>) -> MergedBatch {
    let mut merged = MergedBatch::default();
    for (url, outcome) in sources.iter().zip(outcomes) {
        match outcome {
            FetchOutcome::Fetched { body } => match extract_items(&body) {
                Ok(mut items) => {
                    tracing::debug!(url = %url, items = items.len(), "source merged");
                    merged.items.append(&mut items);
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "malformed source payload; contributing zero items");
                    counter!(SOURCES_DEGRADED_TOTAL).increment(1);
                    merged.degraded_sources.push(url.clone());
                }
            },
            FetchOutcome::Degraded { .. } => merged.degraded_sources.push(url.clone()),
        }
    }
    merged
}

/// Keep only the items published on the current date (order preserved).
pub fn filter_fresh(items: Vec<NewsItem>, clock: &dyn Clock) -> Vec<NewsItem> {
    items
        .into_iter()
        .filter(|it| is_published_today(&it.published, clock))
        .collect()
}
