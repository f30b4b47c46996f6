// src/ingest/freshness.rs
//! "Published today" classification for upstream timestamps.

use chrono::{DateTime, FixedOffset, Utc};
use tracing::warn;

/// Layout of the `published` field, e.g. `Mon, 28 Jul 2025 20:23:43 +0100`.
/// The weekday name must be present but is not checked against the date.
pub const PUBLISHED_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// `PUBLISHED_FORMAT` after the `<weekday>, ` prefix.
const DATE_FORMAT: &str = "%d %b %Y %H:%M:%S %z";

/// Source of "now"; injectable so date boundaries can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn from_rfc3339(s: &str) -> anyhow::Result<Self> {
        let dt = DateTime::parse_from_rfc3339(s)?;
        Ok(Self(dt.with_timezone(&Utc)))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn parse_published(text: &str) -> Option<DateTime<FixedOffset>> {
    let (weekday, rest) = text.trim().split_once(',')?;
    if weekday.len() != 3 || !weekday.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    DateTime::parse_from_str(rest.trim_start(), DATE_FORMAT).ok()
}

/// True when `published` falls on the current calendar date, both dates taken
/// in the timestamp's own UTC offset. Unparseable input is never "today".
pub fn is_published_today(published: &str, clock: &dyn Clock) -> bool {
    let Some(ts) = parse_published(published) else {
        warn!(published = %published, format = PUBLISHED_FORMAT, "unparseable published timestamp; excluding item");
        return false;
    };
    let today = clock.now().with_timezone(ts.offset()).date_naive();
    ts.date_naive() == today
}
