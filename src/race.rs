//! Error race detection.
//!
//! Several configuration errors are mutually exclusive in practice, but the
//! tracker cannot know which one (if any) the CLI will report. One watcher
//! per candidate runs concurrently against the same log path, and the
//! detector waits for *all* of them to settle before deciding.
//!
//! Waiting for all is deliberate: a candidate that times out quickly can
//! settle before a slower candidate that actually matches, so first-settled
//! -wins would produce false negatives under scheduler jitter. Every watcher
//! carries a hard timeout, so waiting for the full set is still bounded.

use std::path::Path;

use tracing::debug;

use crate::milestones::{ERROR_CANDIDATES, ErrorKind};
use crate::watcher::{CancelToken, WatchBudget, watch};

/// Race all error-candidate watchers and resolve to the highest-priority
/// match, or [`ErrorKind::None`] when nothing matched within the budget.
///
/// The watchers are read-only against the log file, so running them on
/// concurrent threads is data-race-free. Priority is the candidates'
/// declaration order, independent of which thread finishes first.
pub fn detect_first_error(path: &Path, budget: WatchBudget, token: &CancelToken) -> ErrorKind {
    let verdicts: Vec<bool> = std::thread::scope(|s| {
        let handles: Vec<_> = ERROR_CANDIDATES
            .iter()
            .map(|kind| s.spawn(move || watch(path, kind.term(), budget, token).found()))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(false))
            .collect()
    });

    for (kind, found) in ERROR_CANDIDATES.into_iter().zip(verdicts) {
        if found {
            debug!(?kind, "configuration error detected");
            return kind;
        }
    }
    ErrorKind::None
}
