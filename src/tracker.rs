//! Job lifecycle tracking state machine.
//!
//! The tracker is driven entirely from outside: an external controller calls
//! `run()` once to trigger a job, then `advance()` repeatedly to ask for
//! status. Each `advance()` moves the machine forward by **at most one**
//! stage and returns a plain status string quickly — waiting is bounded by
//! the single currently-awaited milestone's budget, never by job completion.
//!
//! ## Stages
//!
//! ```text
//! NOT_TRIGGERED → TRIGGERED → ERROR_CLEARED → UPLOAD_STARTED
//!     → UPLOAD_DONE → SERVER_CONNECTED → LINK_FOUND        (terminal)
//! TRIGGERED ... → TERMINATED_WITHOUT_LINK                  (terminal)
//! ```
//!
//! Every stage implies its predecessors. The per-run flags are monotonic;
//! only `run()` resets them, by replacing the whole state record.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::BudgetsConfig;
use crate::launcher::{Credentials, Launcher};
use crate::link;
use crate::log::{TrackEvent, TrackerLog};
use crate::logfile;
use crate::milestones::{self, ErrorKind};
use crate::race;
use crate::watcher::{CancelToken, watch};

pub const MSG_NOT_TRIGGERED: &str =
    "Test execution has not been triggered yet. Trigger the job again before asking for status.";
pub const MSG_TRIGGERED: &str = "Job triggered: the CLI is processing the tracking request.";
pub const MSG_ERROR_CLEARED: &str =
    "No configuration errors detected; the job was accepted and the upload is being tracked.";
pub const MSG_UPLOAD_STARTED: &str = "Test archive is being created and uploaded.";
pub const MSG_UPLOAD_DONE: &str = "Test archive uploaded.";
pub const MSG_SERVER_CONNECTED: &str =
    "Connected to the HyperExecute server; the job is executing.";
pub const MSG_TERMINATED_WITHOUT_LINK: &str =
    "Job tracking finished without a job link. Inspect the CLI log manually.";
pub const MSG_STILL_RUNNING: &str = "Job is still running; check again for progress.";
pub const MSG_COULD_NOT_ANALYZE: &str = "Could not analyze the CLI log; try again.";

/// Lifecycle stage, derived from the per-run flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    NotTriggered,
    Triggered,
    ErrorCleared,
    UploadStarted,
    UploadDone,
    ServerConnected,
    LinkFound,
    TerminatedWithoutLink,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::LinkFound | Stage::TerminatedWithoutLink)
    }
}

/// Mutable per-run record. Boolean flags only ever go false → true within a
/// run; a new run replaces the whole record.
#[derive(Debug, Clone, Default)]
pub struct JobRunState {
    pub run_id: String,
    pub triggered: bool,
    pub error_cleared: bool,
    pub upload_started: bool,
    pub upload_done: bool,
    pub server_connected: bool,
    pub link: Option<String>,
    pub terminated_without_link: bool,
}

impl JobRunState {
    fn fresh() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            ..Self::default()
        }
    }

    pub fn stage(&self) -> Stage {
        if self.terminated_without_link {
            Stage::TerminatedWithoutLink
        } else if self.link.is_some() {
            Stage::LinkFound
        } else if self.server_connected {
            Stage::ServerConnected
        } else if self.upload_done {
            Stage::UploadDone
        } else if self.upload_started {
            Stage::UploadStarted
        } else if self.error_cleared {
            Stage::ErrorCleared
        } else if self.triggered {
            Stage::Triggered
        } else {
            Stage::NotTriggered
        }
    }
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("no active run: call run() before advance()")]
    NoActiveRun,
}

/// Paths and budgets the tracker operates with.
#[derive(Debug)]
pub struct TrackerConfig {
    /// The CLI log file the tracker watches.
    pub log_path: PathBuf,
    /// The HyperExecute YAML handed to the launcher. A valid file must exist
    /// here before `run()`; the tracker does not validate it.
    pub yaml_path: PathBuf,
    pub budgets: BudgetsConfig,
}

/// The per-job state machine coordinating watchers and producing status
/// messages. One tracker instance tracks one job at a time; a second `run()`
/// cancels and replaces the first.
pub struct JobTracker {
    config: TrackerConfig,
    credentials: Credentials,
    launcher: Box<dyn Launcher>,
    audit: Option<TrackerLog>,
    state: Option<JobRunState>,
    token: CancelToken,
}

impl JobTracker {
    pub fn new(
        config: TrackerConfig,
        credentials: Credentials,
        launcher: Box<dyn Launcher>,
        audit: Option<TrackerLog>,
    ) -> Self {
        Self {
            config,
            credentials,
            launcher,
            audit,
            state: None,
            token: CancelToken::new(),
        }
    }

    /// The current run's state, if a run has been triggered.
    pub fn state(&self) -> Option<&JobRunState> {
        self.state.as_ref()
    }

    pub fn stage(&self) -> Stage {
        self.state.as_ref().map_or(Stage::NotTriggered, JobRunState::stage)
    }

    pub fn is_terminal(&self) -> bool {
        self.stage().is_terminal()
    }

    /// Token for the current run. Cancelling it abandons any in-flight
    /// watcher; `run()` mints a fresh one.
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Trigger a new run: reset state, launch the CLI, and poll briefly for
    /// the trigger milestone. Returns without blocking for job completion.
    ///
    /// Any previous run's watchers are cancelled first, so overlapping runs
    /// never race on the same log path.
    pub fn run(&mut self) -> String {
        self.token.cancel();
        self.token = CancelToken::new();
        let state = JobRunState::fresh();
        info!(run_id = %state.run_id, "starting run");

        // Launcher failures surface only as "trigger absent within timeout":
        // the CLI may be missing or misconfigured, but the contract with the
        // controller is a status string either way.
        match self.launcher.launch(&self.credentials, &self.config.yaml_path) {
            Ok(handle) => {
                if let Some(pid) = handle.pid() {
                    info!(pid, "hyperexecute launched");
                }
                self.audit(TrackEvent::RunTriggered {
                    run_id: state.run_id.clone(),
                    config_path: self.config.yaml_path.display().to_string(),
                });
            }
            Err(e) => warn!("launch failed: {e:#}"),
        }

        self.state = Some(state);

        if self.await_trigger() {
            MSG_TRIGGERED.to_string()
        } else {
            MSG_NOT_TRIGGERED.to_string()
        }
    }

    /// Advance the state machine by at most one stage and report status.
    ///
    /// Never blocks beyond one watcher's budget and never panics for
    /// expected conditions; the only error is calling this before any
    /// `run()`. There is no internal retry loop — progress depends entirely
    /// on the controller calling again.
    pub fn advance(&mut self) -> Result<String, TrackerError> {
        if self.state.is_none() {
            return Err(TrackerError::NoActiveRun);
        }

        // Step 1: trigger. The caller must re-invoke run(), not advance(),
        // if the trigger never shows up.
        if !self.current().triggered {
            return Ok(if self.await_trigger() {
                MSG_TRIGGERED.to_string()
            } else {
                MSG_NOT_TRIGGERED.to_string()
            });
        }

        // Terminal fast paths. A cached link is returned verbatim without
        // touching the log again.
        if let Some(url) = self.current().link.clone() {
            return Ok(url);
        }
        if self.current().terminated_without_link {
            return Ok(MSG_TERMINATED_WITHOUT_LINK.to_string());
        }

        // Step 2: race the configuration-error watchers. Flags are not
        // reset on error; only run() resets.
        let mut cleared_this_call = false;
        if !self.current().error_cleared {
            let kind = race::detect_first_error(
                &self.config.log_path,
                self.config.budgets.error(),
                &self.token,
            );
            if kind != ErrorKind::None {
                self.audit(TrackEvent::ConfigErrorDetected {
                    run_id: self.current().run_id.clone(),
                    kind: format!("{kind:?}"),
                });
                return Ok(kind.remediation().to_string());
            }
            self.current_mut().error_cleared = true;
            self.milestone_reached("error_cleared");
            cleared_this_call = true;
        }

        // Step 3: exactly one bounded watcher for the first unsatisfied
        // milestone.
        if let Some(message) = self.advance_one_milestone() {
            return Ok(message);
        }

        // Step 4: nothing advanced — did tracking finish under us?
        if logfile::probe(&self.config.log_path, milestones::TRACKING_FINISHED) {
            self.current_mut().terminated_without_link = true;
            self.audit(TrackEvent::RunTerminated {
                run_id: self.current().run_id.clone(),
                reason: "tracking finished without a job link".to_string(),
            });
            return Ok(MSG_TERMINATED_WITHOUT_LINK.to_string());
        }

        Ok(if cleared_this_call {
            MSG_ERROR_CLEARED.to_string()
        } else {
            MSG_STILL_RUNNING.to_string()
        })
    }

    /// Watch for the first unsatisfied ordered milestone. Returns the
    /// progress message when a flag was set, `None` when the watcher timed
    /// out or was cancelled.
    fn advance_one_milestone(&mut self) -> Option<String> {
        let path = self.config.log_path.clone();

        if !self.current().upload_started {
            let budget = self.config.budgets.upload_started();
            if watch(&path, milestones::UPLOAD_STARTED, budget, &self.token).found() {
                self.current_mut().upload_started = true;
                self.milestone_reached("upload_started");
                return Some(MSG_UPLOAD_STARTED.to_string());
            }
            return None;
        }

        if !self.current().upload_done {
            let budget = self.config.budgets.upload_done();
            if watch(&path, milestones::UPLOAD_DONE, budget, &self.token).found() {
                self.current_mut().upload_done = true;
                self.milestone_reached("upload_done");
                return Some(MSG_UPLOAD_DONE.to_string());
            }
            return None;
        }

        if !self.current().server_connected {
            let budget = self.config.budgets.server_connected();
            if watch(&path, milestones::SERVER_CONNECTED, budget, &self.token).found() {
                self.current_mut().server_connected = true;
                self.milestone_reached("server_connected");
                return Some(MSG_SERVER_CONNECTED.to_string());
            }
            return None;
        }

        // Link milestone: the label must be visible, then the URL extracted
        // from a fresh snapshot of the whole file.
        let budget = self.config.budgets.link();
        if watch(&path, milestones::JOB_LINK_LABEL, budget, &self.token).found() {
            let Some(snapshot) = logfile::snapshot(&path) else {
                // The label was seen but the log vanished under us; leave
                // state untouched so the call is safely retriable.
                return Some(MSG_COULD_NOT_ANALYZE.to_string());
            };
            let Some(url) = link::extract_job_link(&snapshot) else {
                return Some(MSG_COULD_NOT_ANALYZE.to_string());
            };
            self.current_mut().link = Some(url.clone());
            self.audit(TrackEvent::JobLinkFound {
                run_id: self.current().run_id.clone(),
                url: url.clone(),
            });
            return Some(url);
        }
        None
    }

    /// One bounded poll for the trigger milestone; sets the flag on success.
    fn await_trigger(&mut self) -> bool {
        let found = watch(
            &self.config.log_path,
            milestones::TRIGGERED,
            self.config.budgets.trigger(),
            &self.token,
        )
        .found();
        if found {
            self.current_mut().triggered = true;
            self.milestone_reached("triggered");
        }
        found
    }

    fn milestone_reached(&self, milestone: &str) {
        info!(milestone, "milestone reached");
        self.audit(TrackEvent::MilestoneReached {
            run_id: self.current().run_id.clone(),
            milestone: milestone.to_string(),
        });
    }

    /// Audit log writes must never take down the tracker.
    fn audit(&self, event: TrackEvent) {
        if let Some(ref audit) = self.audit {
            if let Err(e) = audit.log(event) {
                warn!("failed to write tracker log: {e:#}");
            }
        }
    }

    // Both accessors are only reachable after the None check in advance()
    // and the assignment in run().
    fn current(&self) -> &JobRunState {
        self.state.as_ref().expect("no active run")
    }

    fn current_mut(&mut self) -> &mut JobRunState {
        self.state.as_mut().expect("no active run")
    }
}
