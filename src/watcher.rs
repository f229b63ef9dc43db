//! Bounded polling watcher.
//!
//! A watcher repeatedly probes the log file for one milestone term until the
//! term appears, its time budget runs out, or its run is cancelled. The
//! deadline is checked *before* each read, which bounds worst-case call
//! latency to `timeout + one interval`.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::logfile;

/// Time budget for one watcher: total timeout and sleep between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchBudget {
    pub timeout: Duration,
    pub interval: Duration,
}

impl WatchBudget {
    pub fn from_millis(timeout_ms: u64, interval_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            interval: Duration::from_millis(interval_ms),
        }
    }
}

/// Cancellation token shared between a run and its in-flight watchers.
///
/// A fresh `run()` cancels the previous run's token so that any watcher still
/// polling on behalf of the stale run abandons its loop at the next tick
/// instead of racing the new run on the same log path.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a watch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchVerdict {
    /// The term appeared in the log within the budget.
    Found,
    /// The budget elapsed without the term appearing.
    TimedOut,
    /// The owning run was cancelled mid-watch.
    Cancelled,
}

impl WatchVerdict {
    pub fn found(self) -> bool {
        self == WatchVerdict::Found
    }
}

/// Poll the log file for `term` until found, timed out, or cancelled.
///
/// Each tick checks elapsed time against the budget before doing any I/O;
/// an exceeded budget is a timeout, not an error. Unreadable log content
/// degrades to "not found yet" — the file may be mid-write or not created
/// yet — so I/O problems never propagate out of the loop.
pub fn watch(path: &Path, term: &str, budget: WatchBudget, token: &CancelToken) -> WatchVerdict {
    let started = Instant::now();
    trace!(term, timeout_ms = budget.timeout.as_millis() as u64, "watch start");

    loop {
        if token.is_cancelled() {
            debug!(term, "watch abandoned: run cancelled");
            return WatchVerdict::Cancelled;
        }
        if started.elapsed() >= budget.timeout {
            debug!(term, "watch timed out");
            return WatchVerdict::TimedOut;
        }

        if logfile::probe(path, term) {
            debug!(term, elapsed_ms = started.elapsed().as_millis() as u64, "milestone found");
            return WatchVerdict::Found;
        }

        std::thread::sleep(budget.interval);
    }
}
