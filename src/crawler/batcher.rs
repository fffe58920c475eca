//! Batch-barrier concurrency
//!
//! The frontier is cut into consecutive groups of `concurrency` nodes. All
//! tasks of a group run concurrently and the group finishes before the next
//! one starts; between groups the batcher pauses to stay under the remote
//! site's rate limits. This is a barrier, not a sliding window.

use crate::config::CrawlerConfig;
use futures::future::join_all;
use std::future::Future;
use std::time::Duration;

/// Outcomes of a batched pass, in frontier order
#[derive(Debug)]
pub struct BatchRun<R> {
    pub outcomes: Vec<R>,

    /// Number of groups that ran
    pub batches: usize,

    /// True if a halting outcome stopped the pass early
    pub halted: bool,
}

/// Runs tasks over a frontier in fixed-size groups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyBatcher {
    concurrency: usize,
    interval: Duration,
}

impl ConcurrencyBatcher {
    pub fn new(concurrency: usize, interval: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            interval,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(config.concurrency as usize, config.interval())
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs `task` once per item, one group at a time
    ///
    /// After each group, if any outcome satisfies `halt`, no further groups
    /// start. Outcomes of the groups that ran are returned in item order.
    pub async fn run<T, R, F, Fut, H>(&self, items: Vec<T>, mut task: F, halt: H) -> BatchRun<R>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = R>,
        H: Fn(&R) -> bool,
    {
        let total = items.len().div_ceil(self.concurrency);
        let mut outcomes = Vec::with_capacity(items.len());
        let mut batches = 0;
        let mut halted = false;

        let mut remaining = items.into_iter().peekable();
        while remaining.peek().is_some() {
            let group: Vec<T> = remaining.by_ref().take(self.concurrency).collect();
            batches += 1;
            tracing::debug!("Batch {}/{}: {} task(s)", batches, total, group.len());

            let results = join_all(group.into_iter().map(&mut task)).await;
            let stop = results.iter().any(&halt);
            outcomes.extend(results);

            if stop {
                tracing::warn!("Halting after batch {}/{}", batches, total);
                halted = true;
                break;
            }

            if remaining.peek().is_some() && !self.interval.is_zero() {
                tokio::time::sleep(self.interval).await;
            }
        }

        BatchRun {
            outcomes,
            batches,
            halted,
        }
    }
}
