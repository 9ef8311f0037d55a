//! Tag extraction worker pool
//!
//! N interchangeable workers pull posts from the ingestion queue, run the tag
//! extractor and push events onto the event queue. With more than one worker
//! the event order can differ from the post order.

use super::collaborators::{guarded, TagExtractor};
use super::queue::{QueueReceiver, QueueSender};
use super::types::{Event, Post};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Per-worker counters returned when the worker exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Events pushed onto the event queue
    pub processed: u64,
    /// Posts whose tag extraction failed (forwarded as tagless events)
    pub failures: u64,
}

impl std::ops::Add for WorkerStats {
    type Output = WorkerStats;

    fn add(self, other: WorkerStats) -> WorkerStats {
        WorkerStats {
            processed: self.processed + other.processed,
            failures: self.failures + other.failures,
        }
    }
}

/// Turn one post into an event, never failing
///
/// Extractor errors and panics are logged and produce a tagless event flagged
/// with `extraction_failed`.
pub fn enrich(extractor: &dyn TagExtractor, post: Post) -> Event {
    match guarded(|| extractor.extract(&post.text)) {
        Ok(tags) => Event::new(post.timestamp, tags),
        Err(e) => {
            log::warn!("⚠️  Tag extraction failed (ts={:.3}): {}", post.timestamp, e);
            Event::failed(post.timestamp)
        }
    }
}

/// Worker loop
///
/// Exits when the ingestion queue is closed and drained, when the event queue
/// has no consumer left, or when `cancel` fires.
pub async fn run_worker(
    id: usize,
    posts: QueueReceiver<Post>,
    events: QueueSender<Event>,
    extractor: Arc<dyn TagExtractor>,
    cancel: CancellationToken,
) -> WorkerStats {
    log::debug!("Worker {} started", id);
    let mut stats = WorkerStats::default();

    loop {
        let post = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::debug!("Worker {} cancelled while waiting for posts", id);
                break;
            }
            post = posts.get() => match post {
                Some(post) => post,
                None => {
                    log::debug!("Worker {}: ingestion queue closed", id);
                    break;
                }
            },
        };

        let event = enrich(extractor.as_ref(), post);
        let failed = event.extraction_failed;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::debug!("Worker {} cancelled while waiting for event queue space", id);
                break;
            }
            result = events.put(event) => {
                if result.is_err() {
                    log::warn!("⚠️  Worker {}: event queue closed, stopping", id);
                    break;
                }
                stats.processed += 1;
                if failed {
                    stats.failures += 1;
                }
            }
        }
    }

    log::debug!(
        "Worker {} stopped ({} events, {} extraction failures)",
        id,
        stats.processed,
        stats.failures
    );
    stats
}

/// Spawn `n_workers` workers sharing the two queues
///
/// Takes ownership of `events` so the event queue closes once the last worker
/// exits.
pub fn spawn_workers(
    n_workers: usize,
    posts: QueueReceiver<Post>,
    events: QueueSender<Event>,
    extractor: Arc<dyn TagExtractor>,
    cancel: CancellationToken,
) -> Vec<JoinHandle<WorkerStats>> {
    (0..n_workers)
        .map(|id| {
            tokio::spawn(run_worker(
                id,
                posts.clone(),
                events.clone(),
                extractor.clone(),
                cancel.clone(),
            ))
        })
        .collect()
}
