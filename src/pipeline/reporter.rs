//! Reporter backends for window summaries
//!
//! Defines the interface the aggregator hands each `Summary` to, plus the
//! in-process backends (log line, channel, fan-out). File backends live in
//! `jsonl_writer` and `sqlite_writer`.

use super::types::Summary;
use async_trait::async_trait;
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum ReportError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Database(String),
    /// Downstream consumer is gone
    Closed,
}

impl From<std::io::Error> for ReportError {
    fn from(err: std::io::Error) -> Self {
        ReportError::Io(err)
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::Serialization(err)
    }
}

impl From<rusqlite::Error> for ReportError {
    fn from(err: rusqlite::Error) -> Self {
        ReportError::Database(err.to_string())
    }
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Io(e) => write!(f, "IO error: {}", e),
            ReportError::Serialization(e) => write!(f, "Serialization error: {}", e),
            ReportError::Database(e) => write!(f, "Database error: {}", e),
            ReportError::Closed => write!(f, "Reporter channel closed"),
        }
    }
}

impl std::error::Error for ReportError {}

/// Consumer of one summary per emitted window, in window order
#[async_trait]
pub trait Reporter: Send {
    /// Publish a single window summary
    async fn report(&mut self, summary: &Summary) -> Result<(), ReportError>;

    /// Flush pending writes to storage
    async fn flush(&mut self) -> Result<(), ReportError> {
        Ok(())
    }

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}

/// Prints every summary as one `log::info!` line
#[derive(Debug, Default)]
pub struct LogReporter;

#[async_trait]
impl Reporter for LogReporter {
    async fn report(&mut self, summary: &Summary) -> Result<(), ReportError> {
        log::info!("{}", summary.render_line());
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "log"
    }
}

/// Forwards summaries into an mpsc channel
///
/// Lets an embedding application (or a test) consume summaries directly.
pub struct ChannelReporter {
    tx: mpsc::Sender<Summary>,
}

impl ChannelReporter {
    pub fn new(tx: mpsc::Sender<Summary>) -> Self {
        Self { tx }
    }

    /// Reporter plus the receiving end, with room for `buffer` summaries
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Summary>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Reporter for ChannelReporter {
    async fn report(&mut self, summary: &Summary) -> Result<(), ReportError> {
        self.tx
            .send(summary.clone())
            .await
            .map_err(|_| ReportError::Closed)
    }

    fn backend_type(&self) -> &'static str {
        "channel"
    }
}

/// Sends every summary to each wrapped reporter
///
/// One backend failing does not stop the others; the first error is
/// returned after all backends were tried.
#[derive(Default)]
pub struct MultiReporter {
    reporters: Vec<Box<dyn Reporter>>,
}

impl MultiReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    pub fn push(&mut self, reporter: Box<dyn Reporter>) {
        self.reporters.push(reporter);
    }

    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }
}

#[async_trait]
impl Reporter for MultiReporter {
    async fn report(&mut self, summary: &Summary) -> Result<(), ReportError> {
        let mut first_err = None;
        for reporter in self.reporters.iter_mut() {
            if let Err(e) = reporter.report(summary).await {
                log::warn!("⚠️  {} reporter failed: {}", reporter.backend_type(), e);
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    async fn flush(&mut self) -> Result<(), ReportError> {
        let mut first_err = None;
        for reporter in self.reporters.iter_mut() {
            if let Err(e) = reporter.flush().await {
                log::warn!("⚠️  {} reporter flush failed: {}", reporter.backend_type(), e);
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn backend_type(&self) -> &'static str {
        "multi"
    }
}
