//! External process launcher.
//!
//! Spawns the `hyperexecute` binary with credentials and a config file. The
//! launcher is a trait seam so the tracker can be driven by a fake in tests
//! that writes log lines instead of running the real CLI.
//!
//! The CLI may exit or detach before the remote job finishes (it is run in
//! no-track mode), so its exit code says nothing about job success. The
//! tracker never inspects it; progress is inferred exclusively from the log
//! file the CLI writes as a side effect.

use std::path::Path;
use std::process::{Child, Command, Stdio};

use anyhow::{Context, Result};
use tracing::info;

/// LambdaTest account credentials passed to the CLI.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub access_key: String,
}

/// Handle to a launched CLI process.
///
/// Holds the child so it isn't reaped early; the exit code is intentionally
/// never consulted. A detached handle represents a launch with no process
/// to hold on to (test fakes, fire-and-forget launchers).
pub struct LaunchHandle {
    child: Option<Child>,
}

impl LaunchHandle {
    pub fn from_child(child: Child) -> Self {
        Self { child: Some(child) }
    }

    pub fn detached() -> Self {
        Self { child: None }
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }
}

/// Trait that all job launchers implement.
///
/// `config_path` must point at a valid HyperExecute YAML; guaranteeing that
/// is the config collaborator's job, not the launcher's.
pub trait Launcher: Send + Sync {
    fn launch(&self, credentials: &Credentials, config_path: &Path) -> Result<LaunchHandle>;
}

/// Production launcher for the `hyperexecute` binary.
pub struct HyperExecuteLauncher {
    /// Binary name or path (default: "hyperexecute").
    program: String,
    /// Skip the CLI's own tracking loop; the log file is our only signal.
    no_track: bool,
}

impl HyperExecuteLauncher {
    pub fn new(program: Option<String>, no_track: bool) -> Self {
        Self {
            program: program.unwrap_or_else(|| "hyperexecute".to_string()),
            no_track,
        }
    }
}

impl Launcher for HyperExecuteLauncher {
    fn launch(&self, credentials: &Credentials, config_path: &Path) -> Result<LaunchHandle> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--user")
            .arg(&credentials.username)
            .arg("--key")
            .arg(&credentials.access_key)
            .arg("--config")
            .arg(config_path);
        if self.no_track {
            cmd.arg("--no-track");
        }
        // The CLI writes its own log file; its stdio is noise we don't read.
        cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());

        info!(
            program = %self.program,
            user = %credentials.username,
            config = %config_path.display(),
            "launching hyperexecute"
        );

        let child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.program))?;

        Ok(LaunchHandle::from_child(child))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify the trait is object-safe (the tracker stores a Box<dyn Launcher>)
    #[test]
    fn trait_is_object_safe() {
        fn _accepts_dyn(_launcher: &dyn Launcher) {}
        let launcher = HyperExecuteLauncher::new(None, true);
        _accepts_dyn(&launcher);
    }

    #[test]
    fn default_program_is_hyperexecute() {
        let launcher = HyperExecuteLauncher::new(None, true);
        assert_eq!(launcher.program, "hyperexecute");
    }

    #[test]
    fn custom_program_path() {
        let launcher = HyperExecuteLauncher::new(Some("/opt/bin/hyperexecute".to_string()), false);
        assert_eq!(launcher.program, "/opt/bin/hyperexecute");
        assert!(!launcher.no_track);
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let launcher =
            HyperExecuteLauncher::new(Some("hyperwatch-no-such-binary".to_string()), true);
        let creds = Credentials {
            username: "user".to_string(),
            access_key: "key".to_string(),
        };
        let result = launcher.launch(&creds, Path::new("hyperexecute.yaml"));
        assert!(result.is_err());
    }
}
