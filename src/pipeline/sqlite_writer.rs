//! SQLite writer for window summaries
//!
//! One row per window in `window_summaries`; the ranked tags are stored as a
//! JSON array in `top_k`.

use super::reporter::{ReportError, Reporter};
use super::types::Summary;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;

pub struct SqliteReporter {
    conn: Connection,
}

impl SqliteReporter {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, ReportError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path.as_ref())?;
        Self::with_connection(conn)
    }

    /// Reporter over an already opened connection (e.g. in-memory)
    pub fn with_connection(conn: Connection) -> Result<Self, ReportError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS window_summaries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                window_start REAL NOT NULL,
                window_end REAL NOT NULL,
                top_k TEXT NOT NULL,
                avg_sentiment REAL NOT NULL,
                event_count INTEGER NOT NULL,
                tagged_event_count INTEGER NOT NULL,
                extraction_failures INTEGER NOT NULL,
                scoring_failures INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_window_start ON window_summaries(window_start DESC)",
            [],
        )?;

        log::info!("✅ SQLite summary table ready");

        Ok(Self { conn })
    }

    pub fn write_summary(&self, summary: &Summary) -> Result<(), ReportError> {
        let top_k = serde_json::to_string(&summary.top_k)?;

        self.conn.execute(
            "INSERT INTO window_summaries
             (window_start, window_end, top_k, avg_sentiment, event_count,
              tagged_event_count, extraction_failures, scoring_failures)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                summary.window_start,
                summary.window_end,
                top_k,
                summary.avg_sentiment,
                summary.event_count as i64,
                summary.tagged_event_count as i64,
                summary.extraction_failures as i64,
                summary.scoring_failures as i64,
            ],
        )?;

        log::debug!(
            "✅ Summary written to SQLite (window {:.3}-{:.3})",
            summary.window_start,
            summary.window_end
        );
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[async_trait]
impl Reporter for SqliteReporter {
    async fn report(&mut self, summary: &Summary) -> Result<(), ReportError> {
        self.write_summary(summary)
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
