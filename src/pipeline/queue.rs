//! Bounded FIFO queues connecting pipeline stages
//!
//! Thin wrapper over `tokio::sync::mpsc::channel`: `put` waits while the
//! queue is full, `get` waits while it is empty. Nothing is ever dropped and
//! the buffer never grows past its capacity, so a slow consumer pushes back
//! all the way to the source.
//!
//! The receiving half is cloneable so several workers can pull from one
//! queue. Consumers take turns on an async mutex around the receiver; items
//! are still handed out in FIFO order.
//!
//! Depth is tracked with a shared counter bumped by `put` before the item
//! becomes visible and dropped by every successful take, so `len()` is exact
//! from either half even while a consumer is parked on the queue.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// Returned by [`QueueSender::put`] when every receiver is gone
///
/// Carries the rejected item back to the caller.
#[derive(Debug, PartialEq, Eq)]
pub struct QueueClosed<T>(pub T);

impl<T> std::fmt::Display for QueueClosed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "queue closed")
    }
}

impl<T: std::fmt::Debug> std::error::Error for QueueClosed<T> {}

/// Outcome of a bounded wait on a queue
#[derive(Debug, PartialEq, Eq)]
pub enum Recv<T> {
    Item(T),
    TimedOut,
    /// Nothing buffered right now (non-blocking take only)
    Empty,
    /// All senders dropped and the buffer is drained
    Closed,
}

/// Create a bounded queue holding at most `capacity` items
///
/// # Panics
/// Panics if `capacity` is zero (same contract as `mpsc::channel`).
pub fn bounded<T>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    let depth = Arc::new(AtomicUsize::new(0));
    (
        QueueSender {
            tx,
            depth: depth.clone(),
            capacity,
        },
        QueueReceiver {
            rx: Arc::new(Mutex::new(rx)),
            depth,
            capacity,
        },
    )
}

pub struct QueueSender<T> {
    tx: mpsc::Sender<T>,
    depth: Arc<AtomicUsize>,
    capacity: usize,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            depth: self.depth.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T> QueueSender<T> {
    /// Enqueue an item, waiting for a free slot while the queue is full
    pub async fn put(&self, item: T) -> Result<(), QueueClosed<T>> {
        let permit = match self.tx.reserve().await {
            Ok(permit) => permit,
            Err(_) => return Err(QueueClosed(item)),
        };
        // Counted before a consumer can take it, so the counter never underflows
        self.depth.fetch_add(1, Ordering::AcqRel);
        permit.send(item);
        Ok(())
    }

    /// Items currently buffered
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct QueueReceiver<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
    depth: Arc<AtomicUsize>,
    capacity: usize,
}

impl<T> Clone for QueueReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
            depth: self.depth.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T> QueueReceiver<T> {
    /// Dequeue the next item, waiting while the queue is empty
    ///
    /// Returns `None` once all senders are dropped and the buffer is drained.
    /// Cancel safe: dropping the future never loses an item.
    pub async fn get(&self) -> Option<T> {
        let mut rx = self.rx.lock().await;
        let item = rx.recv().await;
        if item.is_some() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
        }
        item
    }

    /// Take the next item only if one is already buffered
    ///
    /// Waits for other consumers to release the queue, never for an item.
    pub async fn try_get(&self) -> Recv<T> {
        let mut rx = self.rx.lock().await;
        match rx.try_recv() {
            Ok(item) => {
                self.depth.fetch_sub(1, Ordering::AcqRel);
                Recv::Item(item)
            }
            Err(mpsc::error::TryRecvError::Empty) => Recv::Empty,
            Err(mpsc::error::TryRecvError::Disconnected) => Recv::Closed,
        }
    }

    /// Dequeue with an upper bound on the wait
    pub async fn get_timeout(&self, timeout: Duration) -> Recv<T> {
        match tokio::time::timeout(timeout, self.get()).await {
            Ok(Some(item)) => Recv::Item(item),
            Ok(None) => Recv::Closed,
            Err(_) => Recv::TimedOut,
        }
    }

    /// Items currently buffered
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stop accepting new items; already buffered items can still be read
    pub async fn close(&self) {
        self.rx.lock().await.close();
    }

    /// Throw away everything currently buffered, returning how many items
    /// were discarded
    pub async fn discard(&self) -> usize {
        let mut rx = self.rx.lock().await;
        let mut dropped = 0;
        while rx.try_recv().is_ok() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
            dropped += 1;
        }
        dropped
    }
}
