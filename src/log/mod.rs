//! Structured tracker log — JSON lines per run.
//!
//! Every hyperwatch run appends to a `.jsonl` file capturing what the
//! tracker inferred from the CLI log: trigger, milestones reached,
//! configuration errors, the job link, termination. Each line is a
//! self-contained JSON object with a timestamp, making the file easy to
//! grep, stream, and post-process. This is hyperwatch's own audit trail,
//! distinct from the CLI log it watches.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::debug;

/// A structured event in the tracker log.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// RFC 3339 timestamp.
    pub timestamp: String,
    /// The event type and its data.
    #[serde(flatten)]
    pub event: TrackEvent,
}

/// All event types that can appear in the tracker log.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum TrackEvent {
    /// A run was triggered (the CLI process was launched).
    RunTriggered { run_id: String, config_path: String },
    /// A milestone substring was observed in the CLI log.
    MilestoneReached { run_id: String, milestone: String },
    /// A configuration error was detected instead of progress.
    ConfigErrorDetected { run_id: String, kind: String },
    /// The job link was extracted from the CLI log.
    JobLinkFound { run_id: String, url: String },
    /// Tracking finished without a job link.
    RunTerminated { run_id: String, reason: String },
}

/// Writer for JSON lines tracker logs.
pub struct TrackerLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl TrackerLog {
    /// Create a new tracker log, writing to the given path.
    ///
    /// Creates the file (and parent directories) if they don't exist.
    /// Appends to an existing file.
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory: {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file: {}", path.display()))?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Log an event.
    pub fn log(&self, event: TrackEvent) -> Result<()> {
        let entry = LogEntry {
            timestamp: Utc::now().to_rfc3339(),
            event,
        };

        let json = serde_json::to_string(&entry).context("failed to serialize log entry")?;

        debug!(event = %json, "tracker log");

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("tracker log writer poisoned"))?;
        writeln!(writer, "{json}").context("failed to write log entry")?;
        writer.flush().context("failed to flush log")?;

        Ok(())
    }

    /// Get the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_entry_serializes_to_json() {
        let entry = LogEntry {
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            event: TrackEvent::RunTriggered {
                run_id: "r1".to_string(),
                config_path: "hyperexecute.yaml".to_string(),
            },
        };

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"event\":\"run_triggered\""));
        assert!(json.contains("\"run_id\":\"r1\""));
        assert!(json.contains("\"timestamp\":\"2026-01-01T00:00:00Z\""));
    }

    #[test]
    fn all_event_types_serialize() {
        let events = vec![
            TrackEvent::RunTriggered {
                run_id: "r1".to_string(),
                config_path: "hyperexecute.yaml".to_string(),
            },
            TrackEvent::MilestoneReached {
                run_id: "r1".to_string(),
                milestone: "upload_started".to_string(),
            },
            TrackEvent::ConfigErrorDetected {
                run_id: "r1".to_string(),
                kind: "InvalidCredentials".to_string(),
            },
            TrackEvent::JobLinkFound {
                run_id: "r1".to_string(),
                url: "https://example.com/task?jobId=1".to_string(),
            },
            TrackEvent::RunTerminated {
                run_id: "r1".to_string(),
                reason: "tracking finished without a job link".to_string(),
            },
        ];

        for event in events {
            let entry = LogEntry {
                timestamp: "0".to_string(),
                event,
            };
            let json = serde_json::to_string(&entry);
            assert!(json.is_ok(), "failed to serialize: {entry:?}");

            let s = json.unwrap();
            assert!(s.contains("\"event\":"), "missing event tag in: {s}");
        }
    }

    #[test]
    fn write_and_read_log_file() {
        let tmp = tempfile::tempdir().unwrap();
        let log_path = tmp.path().join("tracker.jsonl");

        let log = TrackerLog::new(&log_path).unwrap();

        log.log(TrackEvent::RunTriggered {
            run_id: "r1".to_string(),
            config_path: "hyperexecute.yaml".to_string(),
        })
        .unwrap();

        log.log(TrackEvent::JobLinkFound {
            run_id: "r1".to_string(),
            url: "https://example.com/task?jobId=1".to_string(),
        })
        .unwrap();

        let content = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        for line in &lines {
            let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(parsed.get("event").is_some());
            assert!(parsed.get("timestamp").is_some());
        }

        assert!(lines[0].contains("\"event\":\"run_triggered\""));
        assert!(lines[1].contains("\"event\":\"job_link_found\""));
    }

    #[test]
    fn creates_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let log_path = tmp.path().join("deep").join("nested").join("tracker.jsonl");

        let log = TrackerLog::new(&log_path).unwrap();
        log.log(TrackEvent::RunTerminated {
            run_id: "r1".to_string(),
            reason: "done".to_string(),
        })
        .unwrap();

        assert!(log_path.exists());
    }

    #[test]
    fn appends_to_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let log_path = tmp.path().join("append.jsonl");

        {
            let log = TrackerLog::new(&log_path).unwrap();
            log.log(TrackEvent::RunTriggered {
                run_id: "r1".to_string(),
                config_path: "a.yaml".to_string(),
            })
            .unwrap();
        }

        {
            let log = TrackerLog::new(&log_path).unwrap();
            log.log(TrackEvent::RunTriggered {
                run_id: "r2".to_string(),
                config_path: "a.yaml".to_string(),
            })
            .unwrap();
        }

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn log_path_accessor() {
        let tmp = tempfile::tempdir().unwrap();
        let log_path = tmp.path().join("tracker.jsonl");

        let log = TrackerLog::new(&log_path).unwrap();
        assert_eq!(log.path(), log_path);
    }

    #[test]
    fn timestamp_is_rfc3339() {
        let tmp = tempfile::tempdir().unwrap();
        let log_path = tmp.path().join("tracker.jsonl");

        let log = TrackerLog::new(&log_path).unwrap();
        log.log(TrackEvent::MilestoneReached {
            run_id: "r1".to_string(),
            milestone: "triggered".to_string(),
        })
        .unwrap();

        let content = std::fs::read_to_string(&log_path).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(content.lines().next().unwrap()).unwrap();
        let ts = parsed["timestamp"].as_str().unwrap();
        assert!(
            chrono::DateTime::parse_from_rfc3339(ts).is_ok(),
            "timestamp should be RFC 3339: {ts}"
        );
    }
}
