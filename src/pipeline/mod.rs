//! # Trend Pipeline
//!
//! Real-time aggregation of short text posts into per-window trend reports:
//! - Posts are pulled from a source into a bounded ingestion queue
//! - A pool of workers extracts hashtags into a bounded event queue
//! - A single aggregator cuts events into tumbling windows
//! - Each window updates a TTL-decayed tag counter and is scored for sentiment
//! - One summary per window (top-K tags + average sentiment) goes to a reporter
//!
//! ## Backpressure
//!
//! Both queues are bounded and block when full. A slow aggregator stalls the
//! workers, which stall the producer, which stops pulling from the source.
//! Nothing is dropped and no buffer grows without bound.
//!
//! ## Ownership
//!
//! The trend tracker is owned by the aggregator task and never shared, so it
//! carries no lock. Queues are the only state shared between tasks.
//!
//! ## Module Organization
//!
//! - `types` - Post, Event, Window, Summary, clock helpers
//! - `config` - Environment-driven configuration
//! - `queue` - Bounded FIFO used for both queues
//! - `collaborators` - Tag extractor / sentiment scorer traits and defaults
//! - `source` - Post sources (simulated feed, iterator)
//! - `workers` - Tag extraction worker pool
//! - `windows` - Tumbling window aggregator
//! - `trends` - Decaying top-K trend tracker
//! - `engine` - Window -> Summary (trends + sentiment)
//! - `ingestion` - Aggregator task loop
//! - `reporter`, `jsonl_writer`, `sqlite_writer` - Summary sinks
//! - `runtime` - Pipeline builder, handle and shutdown

pub mod collaborators;
pub mod config;
pub mod engine;
pub mod ingestion;
pub mod jsonl_writer;
pub mod queue;
pub mod reporter;
pub mod runtime;
pub mod source;
pub mod sqlite_writer;
pub mod trends;
pub mod types;
pub mod windows;
pub mod workers;

// Re-export commonly used types
pub use collaborators::{
    CollaboratorError, HashtagExtractor, LexiconScorer, SentimentScorer, TagExtractor,
};
pub use config::{ConfigError, PipelineConfig};
pub use engine::SummaryEngine;
pub use jsonl_writer::JsonlReporter;
pub use queue::{bounded, QueueReceiver, QueueSender, Recv};
pub use reporter::{ChannelReporter, LogReporter, MultiReporter, ReportError, Reporter};
pub use runtime::{
    Pipeline, PipelineBuilder, PipelineError, PipelineHandle, PipelineStats, ShutdownStrategy,
};
pub use source::{IterSource, PostSource, SimulatedSource};
pub use sqlite_writer::SqliteReporter;
pub use trends::{DecayEntry, TrendTracker};
pub use types::{Clock, Event, Post, Summary, TagCount, Window};
pub use windows::TumblingWindows;
