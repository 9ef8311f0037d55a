//! Trend Runtime - simulated post feed through the full trend pipeline
//!
//! Usage:
//!   cargo run --release --bin trend_runtime
//!
//! Environment variables:
//!   TRENDS_WINDOW_SEC - Window length in seconds (default: 5)
//!   TRENDS_TTL_SEC - Trend decay horizon in seconds (default: 60)
//!   TRENDS_TOP_K - Tags reported per window (default: 5)
//!   TRENDS_WORKERS - Extraction workers (default: 4)
//!   TRENDS_QUEUE_CAPACITY - Queue size (default: 10000)
//!   TRENDS_SOURCE_RATE_HZ - Simulated posts per second (default: 20)
//!   TRENDS_JSONL_PATH - Also append summaries to this JSONL file
//!   TRENDS_SQLITE_PATH - Also store summaries in this SQLite database
//!   TRENDS_RUN_SECS - Stop after this many seconds (default: run until CTRL+C)

use dotenv::dotenv;
use log::{error, info};
use std::time::Duration;
use trendflow::pipeline::{
    JsonlReporter, LogReporter, MultiReporter, Pipeline, PipelineConfig, ShutdownStrategy,
    SqliteReporter,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize environment and logging
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    info!("🚀 Trend Runtime");

    let config = PipelineConfig::from_env();
    if let Err(e) = config.validate() {
        error!("❌ {}", e);
        return Err(e.into());
    }

    let mut reporter = MultiReporter::new().with(Box::new(LogReporter));
    if let Some(path) = &config.jsonl_path {
        reporter.push(Box::new(JsonlReporter::new(path)?));
    }
    if let Some(path) = &config.sqlite_path {
        reporter.push(Box::new(SqliteReporter::new(path)?));
    }
    info!("✅ {} reporter(s) configured", reporter.len());

    let run_secs = config.run_secs;
    let handle = Pipeline::builder()
        .config(config)
        .reporter(reporter)
        .build()?
        .spawn();

    info!("🔄 Press CTRL+C to shutdown gracefully");

    let deadline = async {
        match run_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("⚠️  Received CTRL+C, shutting down..."),
            Err(err) => error!("❌ Failed to listen for CTRL+C: {}", err),
        },
        _ = deadline => info!("⏱️  Run time elapsed, shutting down..."),
    }

    let stats = handle.shutdown(ShutdownStrategy::Drain).await?;
    info!(
        "✅ Trend runtime stopped: {} posts, {} windows, {} extraction failures, {} report failures",
        stats.posts_produced,
        stats.windows_emitted,
        stats.extraction_failures,
        stats.report_failures
    );
    Ok(())
}
