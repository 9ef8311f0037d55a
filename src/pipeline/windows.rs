//! Tumbling window aggregator
//!
//! Pulls events off the event queue and cuts them into back-to-back,
//! non-overlapping windows of fixed length. A window closes when the wait for
//! the next event runs past the window deadline, so windows are emitted even
//! when no event arrived (an empty window signals silence downstream). A
//! caller that comes back after the deadline already passed (slow reporter)
//! gets the events queued so far, taken without waiting.
//!
//! Membership is by consumption time: an event belongs to the window that was
//! open when the aggregator dequeued it, whatever its own timestamp says.
//!
//! Deadlines are tracked on the monotonic runtime clock; the wall clock is
//! only used to label `start`/`end`. If the wall clock steps backwards the
//! labels are clamped so `start` still strictly increases and `end >= start`.

use super::queue::{QueueReceiver, Recv};
use super::types::{Clock, Event, Window};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub struct TumblingWindows {
    events: QueueReceiver<Event>,
    window: Duration,
    clock: Clock,

    /// Wall-clock label of the open window's start
    t0: f64,
    /// Monotonic deadline of the open window
    deadline: Instant,
    bucket: Vec<Event>,

    emitted: u64,
    finished: bool,
}

impl TumblingWindows {
    /// Open the first window immediately
    pub fn new(events: QueueReceiver<Event>, window: Duration, clock: Clock) -> Self {
        let t0 = clock();
        Self {
            events,
            window,
            clock,
            t0,
            deadline: deadline_after(window),
            bucket: Vec::new(),
            emitted: 0,
            finished: false,
        }
    }

    /// Wait for the open window to close and return it
    ///
    /// Returns the final partial window (possibly empty) when `cancel` fires
    /// or the event queue is closed and drained, then `None` on every later
    /// call.
    pub async fn next_window(&mut self, cancel: &CancellationToken) -> Option<Window> {
        if self.finished {
            return None;
        }

        loop {
            if cancel.is_cancelled() {
                log::debug!("Window aggregator cancelled, emitting partial window");
                self.finished = true;
                return Some(self.emit());
            }

            let remaining = self.deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                // The caller overran the window: take what is already queued
                // so a slow consumer still drains the queue.
                self.take_ready().await;
                return Some(self.emit());
            }

            let recv = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                recv = self.events.get_timeout(remaining) => Some(recv),
            };

            match recv {
                Some(Recv::Item(event)) => self.bucket.push(event),
                Some(Recv::TimedOut) | Some(Recv::Empty) => return Some(self.emit()),
                Some(Recv::Closed) => {
                    log::debug!("Event queue closed, emitting final window");
                    self.finished = true;
                    return Some(self.emit());
                }
                None => {
                    log::debug!("Window aggregator cancelled, emitting partial window");
                    self.finished = true;
                    return Some(self.emit());
                }
            }
        }
    }

    /// Move the events already buffered into the open window without waiting
    ///
    /// Capped at the depth seen on entry so a busy producer cannot keep the
    /// window open. Always makes at least one attempt so a closed queue is
    /// noticed.
    async fn take_ready(&mut self) {
        let ready = self.events.len().max(1);
        for _ in 0..ready {
            match self.events.try_get().await {
                Recv::Item(event) => self.bucket.push(event),
                Recv::Closed => {
                    log::debug!("Event queue closed, emitting final window");
                    self.finished = true;
                    break;
                }
                Recv::Empty | Recv::TimedOut => break,
            }
        }
    }

    /// Close the open window and open the next one
    fn emit(&mut self) -> Window {
        let start = self.t0;
        let now = (self.clock)();
        // Wall clock went backwards (or is garbage): zero-length window
        let end = if now >= start { now } else { start };

        let window = Window {
            start,
            end,
            items: std::mem::take(&mut self.bucket),
        };

        self.t0 = if end > start { end } else { nudge_up(start) };
        self.deadline = deadline_after(self.window);
        self.emitted += 1;

        window
    }

    /// Windows emitted so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Events collected in the open window
    pub fn pending(&self) -> usize {
        self.bucket.len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Events currently buffered in the event queue
    pub fn queue_depth(&self) -> usize {
        self.events.len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.events.capacity()
    }
}

/// `now + window`, saturating far in the future instead of overflowing
fn deadline_after(window: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(window)
        .unwrap_or_else(|| now + Duration::from_secs(FAR_FUTURE_SECS))
}

const FAR_FUTURE_SECS: u64 = 86_400 * 365 * 30;

/// Smallest step above `x` that survives f64 rounding at Unix-time magnitudes
fn nudge_up(x: f64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    let step = f64::EPSILON * x.abs().max(1.0);
    x + step
}
