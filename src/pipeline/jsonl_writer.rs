//! JSONL writer for window summaries - one JSON object per line, appended

use super::reporter::{ReportError, Reporter};
use super::types::Summary;
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};

const FLUSH_INTERVAL: Duration = Duration::from_secs(5);

pub struct JsonlReporter {
    writer: BufWriter<std::fs::File>,
    last_flush: Instant,
}

impl JsonlReporter {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        log::info!("📝 Writing window summaries to: {}", path.display());

        Ok(Self {
            writer: BufWriter::new(file),
            last_flush: Instant::now(),
        })
    }

    pub fn write_summary(&mut self, summary: &Summary) -> Result<(), ReportError> {
        let json = serde_json::to_string(summary)?;
        writeln!(self.writer, "{}", json)?;

        // Flush every 5 seconds
        if self.last_flush.elapsed() > FLUSH_INTERVAL {
            self.flush_now()?;
        }

        Ok(())
    }

    pub fn flush_now(&mut self) -> Result<(), ReportError> {
        self.writer.flush()?;
        self.last_flush = Instant::now();
        Ok(())
    }
}

impl Drop for JsonlReporter {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

#[async_trait]
impl Reporter for JsonlReporter {
    async fn report(&mut self, summary: &Summary) -> Result<(), ReportError> {
        self.write_summary(summary)
    }

    async fn flush(&mut self) -> Result<(), ReportError> {
        self.flush_now()
    }

    fn backend_type(&self) -> &'static str {
        "JSONL"
    }
}
