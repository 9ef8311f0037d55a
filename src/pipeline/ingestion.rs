//! Aggregator task - drives windows, trend state and reporting
//!
//! Main loop:
//! 1. Waits for the next tumbling window from the event queue
//! 2. Folds it into the summary engine (trends + sentiment)
//! 3. Hands the summary to the reporter
//! 4. Logs throughput and event queue health
//!
//! Runs until cancelled or until the event queue closes; either way the last
//! partial window is still summarized and reported before returning.

use super::engine::SummaryEngine;
use super::reporter::Reporter;
use super::windows::TumblingWindows;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const THROUGHPUT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Counters returned when the aggregator stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregatorStats {
    pub windows_emitted: u64,
    pub events_consumed: u64,
    pub report_failures: u64,
}

pub async fn run_aggregator(
    mut windows: TumblingWindows,
    mut engine: SummaryEngine,
    mut reporter: Box<dyn Reporter>,
    cancel: CancellationToken,
) -> AggregatorStats {
    log::info!(
        "🚀 Starting window aggregator (reporter: {})",
        reporter.backend_type()
    );

    let mut stats = AggregatorStats::default();
    let mut events_since_log = 0u64;
    let mut last_log_time = Instant::now();

    while let Some(window) = windows.next_window(&cancel).await {
        let summary = engine.summarize(&window);

        stats.windows_emitted += 1;
        stats.events_consumed += window.items.len() as u64;
        events_since_log += window.items.len() as u64;

        if let Err(e) = reporter.report(&summary).await {
            stats.report_failures += 1;
            log::error!("❌ Failed to report window {:.3}-{:.3}: {}", window.start, window.end, e);
        }

        // Log throughput every 10 seconds
        if last_log_time.elapsed() >= THROUGHPUT_LOG_INTERVAL {
            let events_per_sec = events_since_log as f64 / last_log_time.elapsed().as_secs_f64();
            log::info!(
                "📊 Aggregation rate: {:.1} events/sec (total: {}, tracked tags: {}, pending decays: {})",
                events_per_sec,
                stats.events_consumed,
                engine.trends().len(),
                engine.trends().pending()
            );
            last_log_time = Instant::now();
            events_since_log = 0;
        }

        // Warn if the event queue is filling up (> 50% capacity)
        let depth = windows.queue_depth();
        let capacity = windows.queue_capacity();
        if depth > capacity / 2 {
            log::warn!(
                "⚠️  Event queue usage high: {}/{} ({}%)",
                depth,
                capacity,
                (depth * 100) / capacity.max(1)
            );
        }
    }

    if let Err(e) = reporter.flush().await {
        log::error!("❌ Failed final reporter flush: {}", e);
    }

    log::info!(
        "✅ Window aggregator stopped ({} windows, {} events, {} report failures)",
        stats.windows_emitted,
        stats.events_consumed,
        stats.report_failures
    );
    stats
}
