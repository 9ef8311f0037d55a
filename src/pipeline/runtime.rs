//! Pipeline assembly and lifecycle
//!
//! ```text
//! PostSource ─► ingestion queue ─► N workers ─► event queue ─► aggregator ─► Reporter
//!  (producer)      (bounded)      (extract)      (bounded)    (windows+trends)
//! ```
//!
//! `Pipeline::builder()` wires the collaborators, `Pipeline::spawn()` starts
//! every task and returns a `PipelineHandle` that owns them. Shutdown is
//! explicit: either drain what is in flight or drop it on the floor.

use super::collaborators::{HashtagExtractor, LexiconScorer, SentimentScorer, TagExtractor};
use super::config::{ConfigError, PipelineConfig};
use super::engine::SummaryEngine;
use super::ingestion::{run_aggregator, AggregatorStats};
use super::queue::{bounded, QueueReceiver, QueueSender};
use super::reporter::{LogReporter, Reporter};
use super::source::{PostSource, SimulatedSource};
use super::types::{system_clock, Clock, Event, Post};
use super::windows::TumblingWindows;
use super::workers::{spawn_workers, WorkerStats};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How `PipelineHandle::shutdown` treats work already in the queues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownStrategy {
    /// Stop the source only; workers and aggregator finish everything queued,
    /// then the aggregator reports its final window.
    Drain,
    /// Cancel every task right away. Queued posts and events are discarded;
    /// the aggregator still reports the partial window it holds.
    Immediate,
}

#[derive(Debug)]
pub enum PipelineError {
    Config(ConfigError),
    /// A pipeline task panicked or was aborted
    Join(String),
}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        PipelineError::Config(err)
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        PipelineError::Join(err.to_string())
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Config(e) => write!(f, "Pipeline configuration error: {}", e),
            PipelineError::Join(e) => write!(f, "Pipeline task failed: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

/// Totals collected from every task at shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub posts_produced: u64,
    /// Events the workers pushed onto the event queue
    pub events_processed: u64,
    pub extraction_failures: u64,
    pub windows_emitted: u64,
    /// Events the aggregator folded into windows
    pub events_aggregated: u64,
    pub report_failures: u64,
    /// Posts and events still queued when the pipeline stopped
    pub discarded: u64,
}

#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    source: Option<Box<dyn PostSource>>,
    extractor: Option<Arc<dyn TagExtractor>>,
    scorer: Option<Arc<dyn SentimentScorer>>,
    reporter: Option<Box<dyn Reporter>>,
    clock: Option<Clock>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn source(mut self, source: impl PostSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn extractor(mut self, extractor: impl TagExtractor + 'static) -> Self {
        self.extractor = Some(Arc::new(extractor));
        self
    }

    pub fn scorer(mut self, scorer: impl SentimentScorer + 'static) -> Self {
        self.scorer = Some(Arc::new(scorer));
        self
    }

    pub fn reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Some(Box::new(reporter));
        self
    }

    pub fn boxed_reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Wall clock used for window labels and trend sweeps
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the configuration and fill in default collaborators
    ///
    /// Defaults: hashtag extractor, lexicon scorer, log reporter, system
    /// clock. Without an explicit source a simulated feed is started at
    /// `source_rate_hz` when the pipeline is spawned.
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let window = config.window_duration()?;

        Ok(Pipeline {
            config,
            window,
            source: self.source,
            extractor: self.extractor.unwrap_or_else(|| Arc::new(HashtagExtractor)),
            scorer: self.scorer.unwrap_or_else(|| Arc::new(LexiconScorer::default())),
            reporter: self.reporter.unwrap_or_else(|| Box::new(LogReporter)),
            clock: self.clock.unwrap_or_else(system_clock),
        })
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    window: Duration,
    source: Option<Box<dyn PostSource>>,
    extractor: Arc<dyn TagExtractor>,
    scorer: Arc<dyn SentimentScorer>,
    reporter: Box<dyn Reporter>,
    clock: Clock,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Start producer, workers and aggregator on the current Tokio runtime
    pub fn spawn(self) -> PipelineHandle {
        let config = self.config;
        let clock = self.clock;

        let source = self.source.unwrap_or_else(|| {
            Box::new(SimulatedSource::new(config.source_rate_hz, clock.clone()))
        });

        let (post_tx, post_rx) = bounded::<Post>(config.queue_capacity);
        let (event_tx, event_rx) = bounded::<Event>(config.queue_capacity);

        let cancel = CancellationToken::new();
        // Cancelled on its own by a draining shutdown, or with everything else
        let producer_cancel = cancel.child_token();

        log::info!("🚀 Starting trend pipeline");
        log::info!("   ├─ Source: {}", source.name());
        log::info!("   ├─ Workers: {}", config.n_workers);
        log::info!("   ├─ Queue capacity: {}", config.queue_capacity);
        log::info!("   ├─ Window: {}s", config.window_sec);
        log::info!("   └─ Trend TTL: {}s, top-{}", config.ttl_sec, config.k);

        let producer = tokio::spawn(run_producer(source, post_tx, producer_cancel.clone()));

        let workers = spawn_workers(
            config.n_workers,
            post_rx.clone(),
            event_tx,
            self.extractor,
            cancel.clone(),
        );

        let windows = TumblingWindows::new(event_rx.clone(), self.window, clock.clone());
        let engine = SummaryEngine::new_with_clock(config.k, config.ttl_sec, self.scorer, clock);
        let aggregator = tokio::spawn(run_aggregator(windows, engine, self.reporter, cancel.clone()));

        PipelineHandle {
            cancel,
            producer_cancel,
            producer,
            workers,
            aggregator,
            posts: post_rx,
            events: event_rx,
        }
    }
}

/// Pull posts from the source into the ingestion queue until the source ends,
/// the queue closes or `cancel` fires. Returns the number of posts enqueued.
async fn run_producer(
    mut source: Box<dyn PostSource>,
    posts: QueueSender<Post>,
    cancel: CancellationToken,
) -> u64 {
    let name = source.name();
    let mut produced = 0u64;

    loop {
        let post = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            post = source.next_post() => match post {
                Some(post) => post,
                None => {
                    log::info!("Source '{}' exhausted after {} posts", name, produced);
                    break;
                }
            },
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = posts.put(post) => {
                if result.is_err() {
                    log::warn!("⚠️  Ingestion queue closed, stopping producer");
                    break;
                }
                produced += 1;
            }
        }
    }

    log::info!("Producer stopped ({} posts)", produced);
    produced
}

/// Owner of a running pipeline's tasks and queues
pub struct PipelineHandle {
    cancel: CancellationToken,
    producer_cancel: CancellationToken,
    producer: JoinHandle<u64>,
    workers: Vec<JoinHandle<WorkerStats>>,
    aggregator: JoinHandle<AggregatorStats>,
    posts: QueueReceiver<Post>,
    events: QueueReceiver<Event>,
}

impl PipelineHandle {
    /// Token cancelling every task (same as an immediate shutdown)
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Posts currently waiting in the ingestion queue
    pub fn ingestion_depth(&self) -> usize {
        self.posts.len()
    }

    /// Events currently waiting in the event queue
    pub fn event_depth(&self) -> usize {
        self.events.len()
    }

    /// Stop the pipeline and wait for every task to finish
    pub async fn shutdown(self, strategy: ShutdownStrategy) -> Result<PipelineStats, PipelineError> {
        log::info!("⚠️  Shutting down pipeline ({:?})", strategy);
        match strategy {
            ShutdownStrategy::Drain => self.producer_cancel.cancel(),
            ShutdownStrategy::Immediate => self.cancel.cancel(),
        }
        self.join().await
    }

    /// Wait for the pipeline to finish on its own (finite source)
    pub async fn wait(self) -> Result<PipelineStats, PipelineError> {
        self.join().await
    }

    async fn join(self) -> Result<PipelineStats, PipelineError> {
        let mut stats = PipelineStats::default();
        let mut first_err: Option<PipelineError> = None;

        match self.producer.await {
            Ok(produced) => stats.posts_produced = produced,
            Err(e) => {
                log::error!("❌ Producer task failed: {}", e);
                self.cancel.cancel();
                first_err.get_or_insert(e.into());
            }
        }

        for worker in self.workers {
            match worker.await {
                Ok(worker_stats) => {
                    stats.events_processed += worker_stats.processed;
                    stats.extraction_failures += worker_stats.failures;
                }
                Err(e) => {
                    log::error!("❌ Worker task failed: {}", e);
                    self.cancel.cancel();
                    first_err.get_or_insert(e.into());
                }
            }
        }

        match self.aggregator.await {
            Ok(agg) => {
                stats.windows_emitted = agg.windows_emitted;
                stats.events_aggregated = agg.events_consumed;
                stats.report_failures = agg.report_failures;
            }
            Err(e) => {
                log::error!("❌ Aggregator task failed: {}", e);
                first_err.get_or_insert(e.into());
            }
        }

        let discarded = self.posts.discard().await + self.events.discard().await;
        if discarded > 0 {
            log::warn!("⚠️  Discarded {} in-flight items", discarded);
        }
        stats.discarded = discarded as u64;

        if let Some(e) = first_err {
            return Err(e);
        }

        log::info!(
            "✅ Pipeline stopped: {} posts, {} events, {} windows",
            stats.posts_produced,
            stats.events_aggregated,
            stats.windows_emitted
        );
        Ok(stats)
    }
}
