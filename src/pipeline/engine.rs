//! Summary engine - turns closed windows into reportable summaries
//!
//! ```text
//! Window
//!     ↓
//! SummaryEngine::summarize()
//!     ├─ TrendTracker::ingest() per event
//!     ├─ sentiment scoring per tagged event
//!     ├─ TrendTracker::sweep(now)
//!     └─ TrendTracker::topk()
//!     ↓
//! Summary
//! ```
//!
//! Owns the trend tracker outright; it is only ever driven from the
//! aggregator task, so there is no locking here.

use super::collaborators::{guarded, CollaboratorError, SentimentScorer};
use super::trends::TrendTracker;
use super::types::{system_clock, Clock, Event, Summary, Window};
use std::sync::Arc;

/// Result of scoring one window's events
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SentimentStats {
    /// Mean score of the successfully scored events, rounded to 3 decimals
    pub average: f64,
    /// Events with at least one tag
    pub tagged: usize,
    /// Tagged events whose score went into the mean
    pub scored: usize,
    /// Tagged events the scorer failed on (excluded from the mean)
    pub failures: usize,
}

/// Score every tagged event once on its space-joined tags and average
///
/// Untagged events are skipped. Returns an average of 0.0 when nothing could
/// be scored.
pub fn aggregate_sentiment(scorer: &dyn SentimentScorer, items: &[Event]) -> SentimentStats {
    let mut stats = SentimentStats::default();
    let mut sum = 0.0;

    for event in items.iter().filter(|e| e.is_tagged()) {
        stats.tagged += 1;
        let text = event.tags.join(" ");

        let score = guarded(|| scorer.score(&text)).and_then(|score| {
            if score.is_finite() {
                Ok(score)
            } else {
                Err(CollaboratorError::Failed(format!("non-finite score {}", score)))
            }
        });

        match score {
            Ok(score) => {
                sum += score;
                stats.scored += 1;
            }
            Err(e) => {
                log::warn!("⚠️  Sentiment scoring failed for '{}': {}", text, e);
                stats.failures += 1;
            }
        }
    }

    if stats.scored > 0 {
        stats.average = round3(sum / stats.scored as f64);
    }
    stats
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

pub struct SummaryEngine {
    trends: TrendTracker,
    scorer: Arc<dyn SentimentScorer>,

    /// Timestamp function (for testing with mock time)
    now_fn: Clock,
}

impl SummaryEngine {
    /// Engine sweeping trends against the system clock
    pub fn new(k: usize, ttl_sec: f64, scorer: Arc<dyn SentimentScorer>) -> Self {
        Self::new_with_clock(k, ttl_sec, scorer, system_clock())
    }

    /// Engine with a custom clock, used for deterministic tests
    pub fn new_with_clock(
        k: usize,
        ttl_sec: f64,
        scorer: Arc<dyn SentimentScorer>,
        now_fn: Clock,
    ) -> Self {
        Self {
            trends: TrendTracker::new(k, ttl_sec),
            scorer,
            now_fn,
        }
    }

    /// Fold one closed window into the trend state and summarize it
    pub fn summarize(&mut self, window: &Window) -> Summary {
        for event in &window.items {
            self.trends.ingest(&event.tags, event.timestamp);
        }

        let sentiment = aggregate_sentiment(self.scorer.as_ref(), &window.items);

        let now = (self.now_fn)();
        self.trends.sweep(now);

        Summary {
            window_start: window.start,
            window_end: window.end,
            top_k: self.trends.topk(),
            avg_sentiment: sentiment.average,
            event_count: window.items.len(),
            tagged_event_count: sentiment.tagged,
            extraction_failures: window.items.iter().filter(|e| e.extraction_failed).count(),
            scoring_failures: sentiment.failures,
        }
    }

    pub fn trends(&self) -> &TrendTracker {
        &self.trends
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::collaborators::LexiconScorer;
    use crate::pipeline::types::TagCount;

    fn tagged(ts: f64, tags: &[&str]) -> Event {
        Event::new(ts, tags.iter().map(|t| t.to_string()).collect())
    }

    fn window(start: f64, end: f64, items: Vec<Event>) -> Window {
        Window { start, end, items }
    }

    fn fixed_clock(now: f64) -> Clock {
        Arc::new(move || now)
    }

    #[test]
    fn test_summary_of_empty_window_is_neutral() {
        let mut engine =
            SummaryEngine::new_with_clock(5, 60.0, Arc::new(LexiconScorer::default()), fixed_clock(5.0));
        let summary = engine.summarize(&window(0.0, 5.0, vec![]));

        assert_eq!(summary.window_start, 0.0);
        assert_eq!(summary.window_end, 5.0);
        assert!(summary.top_k.is_empty());
        assert_eq!(summary.avg_sentiment, 0.0);
        assert_eq!(summary.event_count, 0);
    }

    #[test]
    fn test_untagged_events_do_not_affect_sentiment() {
        let scorer = |_: &str| -> Result<f64, CollaboratorError> { Ok(1.0) };
        let stats = aggregate_sentiment(&scorer, &[Event::new(0.0, vec![]), Event::failed(1.0)]);
        assert_eq!(stats, SentimentStats::default());
    }

    #[test]
    fn test_sentiment_is_mean_of_tagged_events() {
        let scorer = LexiconScorer::new(["#good"], ["#bad"]);
        let items = vec![
            tagged(0.0, &["#good"]),
            tagged(0.0, &["#bad"]),
            tagged(0.0, &["#good", "#other"]),
            Event::new(0.0, vec![]),
        ];

        let stats = aggregate_sentiment(&scorer, &items);
        assert_eq!(stats.tagged, 3);
        assert_eq!(stats.scored, 3);
        assert_eq!(stats.average, 0.333);
    }

    #[test]
    fn test_scorer_sees_joined_tags() {
        let scorer = |text: &str| -> Result<f64, CollaboratorError> {
            assert_eq!(text, "#a #b");
            Ok(0.5)
        };
        let stats = aggregate_sentiment(&scorer, &[tagged(0.0, &["#a", "#b"])]);
        assert_eq!(stats.average, 0.5);
    }

    #[test]
    fn test_scoring_failures_are_excluded_and_counted() {
        let scorer = |text: &str| -> Result<f64, CollaboratorError> {
            match text {
                "#err" => Err(CollaboratorError::Failed("model offline".to_string())),
                "#panic" => panic!("scorer exploded"),
                "#nan" => Ok(f64::NAN),
                _ => Ok(-1.0),
            }
        };
        let items = vec![
            tagged(0.0, &["#err"]),
            tagged(0.0, &["#panic"]),
            tagged(0.0, &["#nan"]),
            tagged(0.0, &["#fine"]),
        ];

        let stats = aggregate_sentiment(&scorer, &items);
        assert_eq!(stats.failures, 3);
        assert_eq!(stats.scored, 1);
        assert_eq!(stats.average, -1.0);
    }

    #[test]
    fn test_summarize_feeds_trends_and_sweeps() {
        let mut engine =
            SummaryEngine::new_with_clock(2, 10.0, Arc::new(LexiconScorer::default()), fixed_clock(11.0));

        let first = engine.summarize(&window(
            0.0,
            5.0,
            vec![tagged(0.0, &["#old"]), tagged(4.0, &["#a", "#b", "#a"])],
        ));

        // #old expired at 10 <= 11; #a/#b expire at 14
        assert_eq!(
            first.top_k,
            vec![TagCount::new("#a", 2), TagCount::new("#b", 1)]
        );
        assert_eq!(first.event_count, 2);
        assert_eq!(first.tagged_event_count, 2);
        assert_eq!(engine.trends().count("#old"), 0);

        let second = engine.summarize(&window(5.0, 10.0, vec![Event::failed(6.0)]));
        assert_eq!(second.extraction_failures, 1);
        assert_eq!(second.tagged_event_count, 0);
        assert_eq!(second.top_k, first.top_k);
    }
}
