//! Post sources feeding the ingestion queue
//!
//! A source is a lazy, non-restartable sequence of posts. Pacing is the
//! source's own business; the pipeline just awaits the next post.

use super::types::{Clock, Post};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Tags the simulated source picks from
pub const SIMULATED_TAGS: [&str; 6] = ["#ai", "#python", "#java", "#nlp", "#efficient", "#stream"];

/// Interval between posts at `rate_hz`, or `None` when the rate is not
/// positive or so high that the period rounds to zero
pub fn tick_period(rate_hz: f64) -> Option<Duration> {
    if !(rate_hz.is_finite() && rate_hz > 0.0) {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / rate_hz)
        .ok()
        .filter(|period| !period.is_zero())
}

#[async_trait]
pub trait PostSource: Send {
    /// Next post, or `None` once the source is exhausted
    async fn next_post(&mut self) -> Option<Post>;

    /// Name used in log lines
    fn name(&self) -> &'static str {
        "source"
    }
}

/// Synthetic feed emitting roughly `rate_hz` posts per second
///
/// Each post reads `Post <n> <tag>` with a random number in 1..=999 and a
/// random tag from [`SIMULATED_TAGS`].
pub struct SimulatedSource {
    ticker: Interval,
    clock: Clock,
    limit: Option<u64>,
    emitted: u64,
}

impl SimulatedSource {
    pub fn new(rate_hz: f64, clock: Clock) -> Self {
        let period = match tick_period(rate_hz) {
            Some(period) => period,
            None if rate_hz.is_finite() && rate_hz > 0.0 => {
                log::warn!("Source rate {} too high, pacing at 1 post/ns", rate_hz);
                Duration::from_nanos(1)
            }
            None => {
                log::warn!("Invalid source rate {}, defaulting to 1 post/sec", rate_hz);
                Duration::from_secs(1)
            }
        };

        let mut ticker = interval(period);
        // Falling behind should slow the feed down, not cause a burst
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            ticker,
            clock,
            limit: None,
            emitted: 0,
        }
    }

    /// Stop after `limit` posts
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

#[async_trait]
impl PostSource for SimulatedSource {
    async fn next_post(&mut self) -> Option<Post> {
        if self.limit.is_some_and(|limit| self.emitted >= limit) {
            return None;
        }

        self.ticker.tick().await;

        let text = {
            let mut rng = rand::thread_rng();
            let n: u32 = rng.gen_range(1..=999);
            let tag = SIMULATED_TAGS[rng.gen_range(0..SIMULATED_TAGS.len())];
            format!("Post {} {}", n, tag)
        };

        self.emitted += 1;
        Some(Post::new((self.clock)(), text))
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

/// Source over any iterator of posts, emitted as fast as they are accepted
pub struct IterSource<I> {
    posts: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = Post> + Send,
{
    pub fn new<T>(posts: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            posts: posts.into_iter(),
        }
    }
}

#[async_trait]
impl<I> PostSource for IterSource<I>
where
    I: Iterator<Item = Post> + Send,
{
    async fn next_post(&mut self) -> Option<Post> {
        self.posts.next()
    }

    fn name(&self) -> &'static str {
        "iter"
    }
}
