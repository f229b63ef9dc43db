//! Log snapshot reading and milestone matching.
//!
//! The CLI log is practically one JSON object per line, but the tracker
//! treats every byte of it as opaque text: milestone detection is a
//! case-insensitive substring search over the full file content, nothing
//! more. The file belongs to another process and may not exist yet, or may
//! be mid-write, at any poll instant.

use std::path::Path;

use tracing::debug;

/// Read the full current content of the log file.
///
/// Returns `None` when the file is missing or unreadable. The producer may
/// not have created it yet, and a read can race an in-flight append, so
/// neither case is an error at poll time.
pub fn snapshot(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            debug!(path = %path.display(), "log not readable yet: {e}");
            None
        }
    }
}

/// Case-insensitive substring test over a snapshot.
pub fn contains_term(snapshot: &str, term: &str) -> bool {
    snapshot.to_lowercase().contains(&term.to_lowercase())
}

/// Probe the log file for a milestone term.
///
/// Missing file and unreadable file both report `false` — "not yet found".
pub fn probe(path: &Path, term: &str) -> bool {
    match snapshot(path) {
        Some(content) => contains_term(&content, term),
        None => false,
    }
}
