//! Time-decayed trending tag counter
//!
//! Every tag occurrence increments a per-tag count and schedules a matching
//! decrement `ttl` seconds after the occurrence. Scheduled decrements live in
//! a min-heap keyed on expiry, so `ingest` is O(log n) and `sweep` only
//! touches entries that are actually due.
//!
//! Invariant: for every tag present in `counts`, the sum of `amount` over the
//! pending heap entries for that tag equals its count. Tags whose count drops
//! to zero are removed from the map.
//!
//! Not internally synchronized. The window aggregator is the single owner;
//! wrap it in a mutex if it ever needs to be shared.

use super::types::TagCount;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

/// Scheduled future decrement of one tag
#[derive(Debug, Clone, PartialEq)]
pub struct DecayEntry {
    pub expire_at: f64,
    pub tag: String,
    pub amount: i64,
}

impl Eq for DecayEntry {}

impl Ord for DecayEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.expire_at
            .total_cmp(&other.expire_at)
            .then_with(|| self.tag.cmp(&other.tag))
            .then_with(|| self.amount.cmp(&other.amount))
    }
}

impl PartialOrd for DecayEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone)]
pub struct TrendTracker {
    k: usize,
    ttl: f64,
    counts: HashMap<String, i64>,
    decay: BinaryHeap<Reverse<DecayEntry>>,
}

impl TrendTracker {
    pub fn new(k: usize, ttl_sec: f64) -> Self {
        Self {
            k,
            ttl: ttl_sec,
            counts: HashMap::new(),
            decay: BinaryHeap::new(),
        }
    }

    /// Count each tag once and schedule its decay at `ts + ttl`
    ///
    /// A non-finite `ts` is scheduled as already expired so the next sweep
    /// retracts it.
    pub fn ingest<S: AsRef<str>>(&mut self, tags: &[S], ts: f64) {
        let expire_at = ts + self.ttl;
        let expire_at = if expire_at.is_nan() || expire_at == f64::INFINITY {
            f64::NEG_INFINITY
        } else {
            expire_at
        };

        for tag in tags {
            let tag = tag.as_ref();
            *self.counts.entry(tag.to_string()).or_insert(0) += 1;
            self.decay.push(Reverse(DecayEntry {
                expire_at,
                tag: tag.to_string(),
                amount: 1,
            }));
        }
    }

    /// Apply every decrement due at or before `now`
    ///
    /// Returns the number of decay entries applied. Calling it again with the
    /// same `now` is a no-op.
    pub fn sweep(&mut self, now: f64) -> usize {
        if now.is_nan() {
            return 0;
        }

        let mut applied = 0;

        while let Some(Reverse(next)) = self.decay.peek() {
            if next.expire_at > now {
                break;
            }

            let Some(Reverse(entry)) = self.decay.pop() else {
                break;
            };
            applied += 1;

            if let Some(count) = self.counts.get_mut(&entry.tag) {
                *count -= entry.amount;
                if *count <= 0 {
                    self.counts.remove(&entry.tag);
                }
            }
        }

        if applied > 0 {
            log::debug!(
                "Trend sweep at {:.3}: {} decays applied, {} tags / {} pending left",
                now,
                applied,
                self.counts.len(),
                self.decay.len()
            );
        }

        applied
    }

    /// Up to `k` tags with the highest current counts
    ///
    /// Ordered by descending count; equal counts are ordered by tag so the
    /// result is deterministic.
    pub fn topk(&self) -> Vec<TagCount> {
        let mut ranked: Vec<(&String, &i64)> = self.counts.iter().collect();
        ranked.sort_unstable_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        ranked
            .into_iter()
            .take(self.k)
            .map(|(tag, count)| TagCount::new(tag.clone(), *count))
            .collect()
    }

    /// Current count of `tag` (0 if absent)
    pub fn count(&self, tag: &str) -> i64 {
        self.counts.get(tag).copied().unwrap_or(0)
    }

    /// Sum of all current counts
    pub fn total(&self) -> i64 {
        self.counts.values().sum()
    }

    /// Number of distinct tags with a positive count
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Number of scheduled decrements not yet applied
    pub fn pending(&self) -> usize {
        self.decay.len()
    }

    /// Earliest scheduled expiry, if any
    pub fn next_expiry(&self) -> Option<f64> {
        self.decay.peek().map(|Reverse(entry)| entry.expire_at)
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn ttl(&self) -> f64 {
        self.ttl
    }
}
