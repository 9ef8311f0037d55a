//! Core data types flowing through the trend pipeline
//!
//! Post (source) -> Event (worker) -> Window (aggregator) -> Summary (reporter)

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Raw text post produced by a [`PostSource`](super::source::PostSource)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Seconds since the Unix epoch (fractional)
    pub timestamp: f64,
    pub text: String,
}

impl Post {
    pub fn new(timestamp: f64, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            text: text.into(),
        }
    }
}

/// Post enriched with its extracted tags
///
/// Keeps the timestamp of the originating post, not the time it was processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: f64,
    pub tags: Vec<String>,
    /// Set when the tag extractor failed for this post; `tags` is then empty
    #[serde(default)]
    pub extraction_failed: bool,
}

impl Event {
    pub fn new(timestamp: f64, tags: Vec<String>) -> Self {
        Self {
            timestamp,
            tags,
            extraction_failed: false,
        }
    }

    pub fn failed(timestamp: f64) -> Self {
        Self {
            timestamp,
            tags: Vec::new(),
            extraction_failed: true,
        }
    }

    pub fn is_tagged(&self) -> bool {
        !self.tags.is_empty()
    }
}

/// One tumbling window worth of events
///
/// Membership is decided by when the aggregator consumed the event, so an
/// event delayed in a worker may land in a later window than its timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub start: f64,
    pub end: f64,
    pub items: Vec<Event>,
}

impl Window {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Tag and its current decayed count, as returned by top-K queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: i64,
}

impl TagCount {
    pub fn new(tag: impl Into<String>, count: i64) -> Self {
        Self {
            tag: tag.into(),
            count,
        }
    }
}

/// Per-window output handed to reporters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub window_start: f64,
    pub window_end: f64,
    pub top_k: Vec<TagCount>,
    pub avg_sentiment: f64,
    /// Events consumed in this window (tagged or not)
    pub event_count: usize,
    /// Events that had at least one tag
    pub tagged_event_count: usize,
    pub extraction_failures: usize,
    pub scoring_failures: usize,
}

impl Summary {
    /// Render the summary the way the console reporter prints it:
    /// `[start-end] top=[(#a, 2), (#b, 1)] sentiment_avg=0.0`
    pub fn render_line(&self) -> String {
        let top = self
            .top_k
            .iter()
            .map(|tc| format!("({}, {})", tc.tag, tc.count))
            .collect::<Vec<_>>()
            .join(", ");

        let mut line = format!(
            "[{}-{}] top=[{}] sentiment_avg={}",
            self.window_start as i64, self.window_end as i64, top, self.avg_sentiment
        );

        if self.extraction_failures > 0 || self.scoring_failures > 0 {
            line.push_str(&format!(
                " failures(extract={}, score={})",
                self.extraction_failures, self.scoring_failures
            ));
        }

        line
    }
}

/// Wall-clock source in fractional Unix seconds
///
/// Injected everywhere time is read so tests can pin or skew it.
pub type Clock = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Current wall-clock time as fractional Unix seconds
pub fn current_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Default clock backed by [`current_timestamp`]
pub fn system_clock() -> Clock {
    Arc::new(current_timestamp)
}
