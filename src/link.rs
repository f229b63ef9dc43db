//! Job link extraction from CLI output.
//!
//! The CLI prints `Job Link: <url>` once the remote job is registered, with
//! terminal styling around it. The label's position in the log is not
//! guaranteed, so extraction always scans the entire snapshot, never just
//! the last line.

use std::sync::LazyLock;

use regex::Regex;

/// Strip ANSI escape sequences from CLI output.
pub fn strip_ansi(input: &str) -> String {
    // Matches CSI sequences (ESC [ ... final byte), OSC sequences (ESC ] ... ST),
    // and simple two-byte escapes (ESC + one char).
    static ANSI_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[^\[\]]").unwrap()
    });
    ANSI_RE.replace_all(input, "").to_string()
}

/// Extract the first labeled job URL from a log snapshot.
///
/// Strips ANSI styling first, then matches `Job Link:\s*(https?://\S+)`
/// against the whole text. Returns `None` when no link has been printed
/// yet; callers distinguish absence from failure by this sentinel.
pub fn extract_job_link(snapshot: &str) -> Option<String> {
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"Job Link:\s*(https?://\S+)").unwrap());

    let clean = strip_ansi(snapshot);
    LINK_RE
        .captures(&clean)
        .map(|caps| caps[1].to_string())
}
