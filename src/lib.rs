//! Log-driven job tracking for the HyperExecute cloud test CLI.
//!
//! The `hyperexecute` binary exposes no structured status API. The only
//! observable signal is the append-only log file it writes while a remote job
//! runs. hyperwatch launches the CLI, then infers job progress by repeatedly
//! snapshotting that log and searching it for known milestone substrings.
//!
//! The public surface is [`tracker::JobTracker`]: `run()` triggers a job and
//! `advance()` moves the lifecycle state machine forward by at most one stage
//! per call, returning a status string quickly instead of blocking until the
//! job finishes.

pub mod cli;
pub mod config;
pub mod launcher;
pub mod link;
pub mod log;
pub mod logfile;
pub mod milestones;
pub mod race;
pub mod tracker;
pub mod watcher;
