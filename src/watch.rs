//! The long-running loop that drains the queue whenever the remote becomes reachable.

use crate::connectivity::{Connectivity, OnlineTracker};
use crate::queue::{DrainOutcome, OfflineQueue};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    /// Time between connectivity checks.
    pub interval: Duration,
    /// Stop after this many checks. `None` runs until shut down.
    pub max_polls: Option<usize>,
}

/// What happened while watching.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct WatchSummary {
    pub polls: usize,
    pub drains: usize,
    pub uploaded: usize,
    pub failures: usize,
}

impl WatchSummary {
    fn record(&mut self, outcome: &DrainOutcome) {
        self.drains += 1;
        match outcome {
            DrainOutcome::Empty => {}
            DrainOutcome::Uploaded { count } => self.uploaded += count,
            DrainOutcome::Failed { .. } => self.failures += 1,
        }
    }
}

/// Polls `connectivity` every `options.interval` and drains `queue` once when the remote is
/// reachable at start, and once more every time it comes back after being unreachable.
///
/// Drain failures are logged and counted, never returned. The loop ends when `shutdown` completes
/// or `options.max_polls` is reached.
pub(crate) async fn run<F>(
    queue: &mut OfflineQueue,
    connectivity: &mut dyn Connectivity,
    options: &WatchOptions,
    shutdown: F,
) -> WatchSummary
where
    F: Future<Output = ()>,
{
    let mut tracker = OnlineTracker::new();
    let mut summary = WatchSummary::default();
    let mut ticker = tokio::time::interval(options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        if options.max_polls.is_some_and(|max| summary.polls >= max) {
            debug!("Reached {} connectivity checks, stopping", summary.polls);
            break;
        }
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
            _ = ticker.tick() => {}
        }

        let was_online = tracker.is_online();
        let online = connectivity.is_online().await;
        summary.polls += 1;
        let trigger = tracker.observe(online);
        if !online && was_online != Some(false) {
            warn!("The remote is unreachable, new records stay queued until it comes back");
        }

        if let Some(trigger) = trigger {
            info!("Draining the queue ({trigger})");
            let outcome = queue.drain().await;
            if let Some(notice) = outcome.notice() {
                info!("{notice}");
            }
            summary.record(&outcome);
        }
    }
    summary
}
