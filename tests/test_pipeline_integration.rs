//! End-to-end tests for the trend pipeline
//!
//! Every test drives the public API only: a source feeds the pipeline, a
//! channel reporter collects the summaries, and the handle's stats are
//! checked after shutdown.
//!
//! Key integration points tested:
//! - Draining shutdown delivers every queued post
//! - Extraction and scoring failures are counted, not fatal
//! - Bounded queues hold an unpaced source back under a slow reporter
//! - Trend counts carry across windows and decay after the TTL

#[cfg(test)]
mod pipeline_integration_tests {
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use trendflow::pipeline::types::current_timestamp;
    use trendflow::pipeline::{
        ChannelReporter, CollaboratorError, IterSource, Pipeline, PipelineConfig, Post,
        ReportError, Reporter, ShutdownStrategy, SimulatedSource, Summary, TagCount,
    };

    fn config(window_sec: f64, queue_capacity: usize) -> PipelineConfig {
        PipelineConfig {
            window_sec,
            ttl_sec: 60.0,
            k: 5,
            n_workers: 3,
            queue_capacity,
            ..PipelineConfig::default()
        }
    }

    fn collect(rx: &mut mpsc::Receiver<Summary>) -> Vec<Summary> {
        let mut out = Vec::new();
        while let Ok(summary) = rx.try_recv() {
            out.push(summary);
        }
        out
    }

    /// Reporter that stalls on every window, standing in for a slow sink
    struct SlowReporter {
        delay: Duration,
        tx: mpsc::UnboundedSender<Summary>,
    }

    #[async_trait]
    impl Reporter for SlowReporter {
        async fn report(&mut self, summary: &Summary) -> Result<(), ReportError> {
            tokio::time::sleep(self.delay).await;
            self.tx.send(summary.clone()).map_err(|_| ReportError::Closed)
        }

        fn backend_type(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_drain_delivers_every_post() {
        let now = current_timestamp();
        let posts = vec![
            Post::new(now, "#rust is lindo"),
            Post::new(now, "#rust #tokio"),
            Post::new(now, "nothing here"),
            Post::new(now, "#Tokio rápido"),
        ];
        let (reporter, mut summaries) = ChannelReporter::channel(256);

        let handle = Pipeline::builder()
            .config(config(0.05, 8))
            .source(IterSource::new(posts))
            .reporter(reporter)
            .build()
            .unwrap()
            .spawn();

        let stats = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("finite source should end the pipeline")
            .unwrap();

        assert_eq!(stats.posts_produced, 4);
        assert_eq!(stats.events_processed, 4);
        assert_eq!(stats.events_aggregated, 4);
        assert_eq!(stats.extraction_failures, 0);
        assert_eq!(stats.discarded, 0);

        let received = collect(&mut summaries);
        assert_eq!(received.len() as u64, stats.windows_emitted);

        let total_events: usize = received.iter().map(|s| s.event_count).sum();
        assert_eq!(total_events, 4);

        // Tags are lowercased, untagged posts still count as events
        let last = received.last().unwrap();
        assert_eq!(
            last.top_k,
            vec![TagCount::new("#rust", 2), TagCount::new("#tokio", 2)]
        );
    }

    #[tokio::test]
    async fn test_drain_shutdown_of_live_source() {
        let (reporter, mut summaries) = ChannelReporter::channel(1024);

        let handle = Pipeline::builder()
            .config(config(0.05, 32))
            .source(SimulatedSource::new(500.0, trendflow::pipeline::types::system_clock()))
            .reporter(reporter)
            .build()
            .unwrap()
            .spawn();

        tokio::time::sleep(Duration::from_millis(200)).await;

        let stats = tokio::time::timeout(
            Duration::from_secs(5),
            handle.shutdown(ShutdownStrategy::Drain),
        )
        .await
        .expect("drain should finish once the queues are empty")
        .unwrap();

        assert!(stats.posts_produced > 0);
        // Nothing produced is lost on a draining shutdown
        assert_eq!(stats.events_processed, stats.posts_produced);
        assert_eq!(stats.events_aggregated, stats.posts_produced);
        assert_eq!(stats.discarded, 0);

        let received = collect(&mut summaries);
        let total_events: usize = received.iter().map(|s| s.event_count).sum();
        assert_eq!(total_events as u64, stats.posts_produced);
    }

    #[tokio::test]
    async fn test_collaborator_failures_are_counted() {
        let now = current_timestamp();
        let posts = vec![
            Post::new(now, "#ok bueno"),
            Post::new(now, "boom"),
            Post::new(now, "#ok #bad"),
            Post::new(now, "#ok"),
        ];
        let (reporter, mut summaries) = ChannelReporter::channel(256);

        let handle = Pipeline::builder()
            .config(config(0.05, 8))
            .source(IterSource::new(posts))
            .extractor(|text: &str| -> Result<Vec<String>, CollaboratorError> {
                if text == "boom" {
                    return Err(CollaboratorError::Failed("unparseable".to_string()));
                }
                Ok(text
                    .split_whitespace()
                    .filter(|word| word.starts_with('#'))
                    .map(str::to_string)
                    .collect())
            })
            // Scored on the joined tags of each event
            .scorer(|tags: &str| -> Result<f64, CollaboratorError> {
                if tags.contains("#bad") {
                    panic!("scorer blew up");
                }
                Ok(1.0)
            })
            .reporter(reporter)
            .build()
            .unwrap()
            .spawn();

        let stats = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .unwrap()
            .unwrap();

        // The failed post still travels through the pipeline as an event
        assert_eq!(stats.extraction_failures, 1);
        assert_eq!(stats.events_aggregated, 4);

        let received = collect(&mut summaries);
        let extract_failures: usize = received.iter().map(|s| s.extraction_failures).sum();
        let scoring_failures: usize = received.iter().map(|s| s.scoring_failures).sum();
        assert_eq!(extract_failures, 1);
        assert_eq!(scoring_failures, 1);

        let last = received.last().unwrap();
        assert_eq!(
            last.top_k,
            vec![TagCount::new("#ok", 3), TagCount::new("#bad", 1)]
        );
        for summary in received
            .iter()
            .filter(|s| s.tagged_event_count > s.scoring_failures)
        {
            assert_eq!(summary.avg_sentiment, 1.0);
        }
    }

    #[tokio::test]
    async fn test_backpressure_holds_back_unpaced_source() {
        const CAPACITY: usize = 4;
        const WORKERS: usize = 2;

        let (tx, mut summaries) = mpsc::unbounded_channel();
        let reporter = SlowReporter {
            delay: Duration::from_millis(100),
            tx,
        };

        // Endless source with no pacing: only backpressure can slow it down
        let pulled = Arc::new(AtomicU64::new(0));
        let pulled_by_source = pulled.clone();
        let posts = (0u64..).map(move |i| {
            pulled_by_source.fetch_add(1, Ordering::SeqCst);
            Post::new(current_timestamp(), format!("#t{} post", i % 4))
        });

        let handle = Pipeline::builder()
            .config(PipelineConfig {
                n_workers: WORKERS,
                ..config(0.02, CAPACITY)
            })
            .source(IterSource::new(posts))
            .reporter(reporter)
            .build()
            .unwrap()
            .spawn();

        // Let the first window get reported before sampling
        tokio::time::sleep(Duration::from_millis(300)).await;

        // Posts in flight: one held by the producer, both queues, one per
        // worker, and the window the aggregator is reporting
        let max_in_flight = (3 * CAPACITY + WORKERS + 1) as u64;
        let mut delivered = 0u64;
        let mut first_delivered = None;
        let mut saw_full_queue = false;

        for _ in 0..8 {
            let pulled_now = pulled.load(Ordering::SeqCst);
            while let Ok(summary) = summaries.try_recv() {
                delivered += summary.event_count as u64;
            }
            first_delivered.get_or_insert(delivered);

            assert!(
                pulled_now <= delivered + max_in_flight,
                "source ran ahead of the aggregator: pulled {}, delivered {}",
                pulled_now,
                delivered
            );
            assert!(handle.ingestion_depth() <= CAPACITY);
            assert!(handle.event_depth() <= CAPACITY);
            saw_full_queue |= handle.ingestion_depth() == CAPACITY;

            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        assert!(saw_full_queue, "a stalled aggregator should fill the ingestion queue");
        assert!(delivered > first_delivered.unwrap_or(0), "aggregator stopped consuming");

        let stats = tokio::time::timeout(
            Duration::from_secs(10),
            handle.shutdown(ShutdownStrategy::Drain),
        )
        .await
        .expect("slow reporter should delay, not deadlock, a draining shutdown")
        .unwrap();

        while let Ok(summary) = summaries.try_recv() {
            delivered += summary.event_count as u64;
        }
        assert_eq!(stats.events_aggregated, stats.posts_produced);
        assert_eq!(delivered, stats.posts_produced);
        assert_eq!(stats.discarded, 0);
    }

    #[tokio::test]
    async fn test_drain_with_reporter_slower_than_window() {
        let (tx, mut summaries) = mpsc::unbounded_channel();
        let reporter = SlowReporter {
            delay: Duration::from_millis(100),
            tx,
        };

        let handle = Pipeline::builder()
            .config(config(0.05, 8))
            .source(SimulatedSource::new(200.0, trendflow::pipeline::types::system_clock()))
            .reporter(reporter)
            .build()
            .unwrap()
            .spawn();

        tokio::time::sleep(Duration::from_millis(500)).await;

        let stats = tokio::time::timeout(
            Duration::from_secs(5),
            handle.shutdown(ShutdownStrategy::Drain),
        )
        .await
        .expect("drain should finish even when every report overruns the window")
        .unwrap();

        let mut delivered = 0u64;
        while let Ok(summary) = summaries.try_recv() {
            delivered += summary.event_count as u64;
        }
        assert!(stats.posts_produced > 0);
        assert_eq!(stats.events_aggregated, stats.posts_produced);
        assert_eq!(delivered, stats.posts_produced);
    }

    #[tokio::test]
    async fn test_trends_decay_across_windows() {
        let (reporter, mut summaries) = ChannelReporter::channel(256);
        // Posts stamped far in the past: their counts expire on the first sweep
        let stale = current_timestamp() - 120.0;
        let posts = vec![
            Post::new(stale, "#old #old"),
            Post::new(current_timestamp(), "#fresh"),
        ];

        let handle = Pipeline::builder()
            .config(PipelineConfig {
                ttl_sec: 10.0,
                ..config(0.05, 8)
            })
            .source(IterSource::new(posts))
            .reporter(reporter)
            .build()
            .unwrap()
            .spawn();

        tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .unwrap()
            .unwrap();

        let received = collect(&mut summaries);
        for summary in &received {
            assert!(summary.top_k.iter().all(|t| t.tag != "#old"));
        }
        let last = received.last().unwrap();
        assert_eq!(last.top_k, vec![TagCount::new("#fresh", 1)]);
    }

    #[tokio::test]
    async fn test_immediate_shutdown_reports_partial_window() {
        let (reporter, mut summaries) = ChannelReporter::channel(256);

        let handle = Pipeline::builder()
            .config(PipelineConfig {
                source_rate_hz: 200.0,
                ..config(60.0, 64)
            })
            .reporter(reporter)
            .build()
            .unwrap()
            .spawn();

        tokio::time::sleep(Duration::from_millis(150)).await;
        let stats = tokio::time::timeout(
            Duration::from_secs(2),
            handle.shutdown(ShutdownStrategy::Immediate),
        )
        .await
        .expect("immediate shutdown should not wait for the window")
        .unwrap();

        let received = collect(&mut summaries);
        assert_eq!(received.len(), 1);
        assert_eq!(stats.windows_emitted, 1);
        assert!(received[0].window_end >= received[0].window_start);
        assert_eq!(received[0].event_count as u64, stats.events_aggregated);
    }
}
