use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::debug_log;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(20);

/// One published fetch result.
#[derive(Debug, Clone, PartialEq)]
pub struct PollUpdate<T> {
    pub generation: u64,
    /// The fetched value, or the error text to show the user.
    pub outcome: Result<T, String>,
}

/// Periodically re-runs a fetch and publishes the newest result.
///
/// Every fetch is tagged with a generation. A result is only published if no
/// newer fetch was started (and [`Poller::supersede`] was not called) while it
/// was in flight; stale results are dropped and recorded in the debug log.
pub struct Poller<T> {
    interval: Duration,
    generation: Arc<AtomicU64>,
    sender: Arc<watch::Sender<Option<PollUpdate<T>>>>,
}

impl<T> Clone for Poller<T> {
    fn clone(&self) -> Self {
        Self {
            interval: self.interval,
            generation: self.generation.clone(),
            sender: self.sender.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Poller<T> {
    pub fn new(interval: Duration) -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            interval: interval.max(Duration::from_millis(1)),
            generation: Arc::new(AtomicU64::new(0)),
            sender: Arc::new(sender),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<PollUpdate<T>>> {
        self.sender.subscribe()
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Start a new fetch, invalidating any that are still in flight.
    pub fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Invalidate in-flight fetches without starting a new one.
    pub fn supersede(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Publish the result of the fetch started as `generation`.
    /// Returns `false` when the result was stale and dropped.
    pub fn publish(&self, generation: u64, outcome: Result<T, String>) -> bool {
        let current = self.current_generation();
        if generation != current {
            debug_log::poll_result_discarded(generation, current);
            return false;
        }

        self.sender.send_replace(Some(PollUpdate {
            generation,
            outcome,
        }));
        true
    }

    /// Fetch immediately and then on every interval tick until all receivers
    /// are dropped. Each fetch runs as its own task so a slow response never
    /// delays the next tick.
    pub async fn run<F, Fut>(&self, mut fetch: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if self.sender.is_closed() {
                break;
            }

            let generation = self.begin();
            let pending = fetch();
            let poller = self.clone();
            tokio::spawn(async move {
                let outcome = pending.await.map_err(|e| format!("{e:#}"));
                poller.publish(generation, outcome);
            });
        }
    }
}
