use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::launcher::Credentials;
use crate::watcher::WatchBudget;

const CONFIG_FILENAME: &str = "config.toml";
const CONFIG_DIR: &str = ".hyperwatch";

/// Environment variables that override the configured credentials.
pub const USERNAME_ENV: &str = "LT_USERNAME";
pub const ACCESS_KEY_ENV: &str = "LT_ACCESS_KEY";

#[derive(Debug, Deserialize, Default)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LauncherConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_yaml_path")]
    pub config_path: PathBuf,
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    #[serde(default = "default_no_track")]
    pub no_track: bool,
}

/// Per-milestone `(timeout_ms, interval_ms)` watcher budgets.
///
/// The trigger budget is short (the CLI prints the TraceID line almost
/// immediately when the launch worked); the archive-upload budget is long
/// (the upload is the slow part of a run).
#[derive(Debug, Deserialize)]
pub struct BudgetsConfig {
    #[serde(default = "default_trigger_timeout_ms")]
    pub trigger_timeout_ms: u64,
    #[serde(default = "default_trigger_interval_ms")]
    pub trigger_interval_ms: u64,
    #[serde(default = "default_error_timeout_ms")]
    pub error_timeout_ms: u64,
    #[serde(default = "default_error_interval_ms")]
    pub error_interval_ms: u64,
    #[serde(default = "default_upload_started_timeout_ms")]
    pub upload_started_timeout_ms: u64,
    #[serde(default = "default_upload_started_interval_ms")]
    pub upload_started_interval_ms: u64,
    #[serde(default = "default_upload_done_timeout_ms")]
    pub upload_done_timeout_ms: u64,
    #[serde(default = "default_upload_done_interval_ms")]
    pub upload_done_interval_ms: u64,
    #[serde(default = "default_server_connected_timeout_ms")]
    pub server_connected_timeout_ms: u64,
    #[serde(default = "default_server_connected_interval_ms")]
    pub server_connected_interval_ms: u64,
    #[serde(default = "default_link_timeout_ms")]
    pub link_timeout_ms: u64,
    #[serde(default = "default_link_interval_ms")]
    pub link_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct TrackerLogConfig {
    #[serde(default = "default_tracker_log_enabled")]
    pub enabled: bool,
    #[serde(default = "default_tracker_log_path")]
    pub path: PathBuf,
}

fn default_program() -> String {
    "hyperexecute".to_string()
}

fn default_yaml_path() -> PathBuf {
    PathBuf::from("hyperexecute.yaml")
}

fn default_log_path() -> PathBuf {
    PathBuf::from("hyperexecute-cli.log")
}

fn default_no_track() -> bool {
    true
}

fn default_trigger_timeout_ms() -> u64 {
    10_000
}

fn default_trigger_interval_ms() -> u64 {
    500
}

fn default_error_timeout_ms() -> u64 {
    4_000
}

fn default_error_interval_ms() -> u64 {
    500
}

fn default_upload_started_timeout_ms() -> u64 {
    30_000
}

fn default_upload_started_interval_ms() -> u64 {
    1_000
}

fn default_upload_done_timeout_ms() -> u64 {
    120_000
}

fn default_upload_done_interval_ms() -> u64 {
    2_000
}

fn default_server_connected_timeout_ms() -> u64 {
    30_000
}

fn default_server_connected_interval_ms() -> u64 {
    1_000
}

fn default_link_timeout_ms() -> u64 {
    30_000
}

fn default_link_interval_ms() -> u64 {
    1_000
}

fn default_tracker_log_enabled() -> bool {
    true
}

fn default_tracker_log_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("logs").join("tracker.jsonl")
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            config_path: default_yaml_path(),
            log_path: default_log_path(),
            no_track: default_no_track(),
        }
    }
}

impl Default for BudgetsConfig {
    fn default() -> Self {
        Self {
            trigger_timeout_ms: default_trigger_timeout_ms(),
            trigger_interval_ms: default_trigger_interval_ms(),
            error_timeout_ms: default_error_timeout_ms(),
            error_interval_ms: default_error_interval_ms(),
            upload_started_timeout_ms: default_upload_started_timeout_ms(),
            upload_started_interval_ms: default_upload_started_interval_ms(),
            upload_done_timeout_ms: default_upload_done_timeout_ms(),
            upload_done_interval_ms: default_upload_done_interval_ms(),
            server_connected_timeout_ms: default_server_connected_timeout_ms(),
            server_connected_interval_ms: default_server_connected_interval_ms(),
            link_timeout_ms: default_link_timeout_ms(),
            link_interval_ms: default_link_interval_ms(),
        }
    }
}

impl Default for TrackerLogConfig {
    fn default() -> Self {
        Self {
            enabled: default_tracker_log_enabled(),
            path: default_tracker_log_path(),
        }
    }
}

impl BudgetsConfig {
    pub fn trigger(&self) -> WatchBudget {
        WatchBudget::from_millis(self.trigger_timeout_ms, self.trigger_interval_ms)
    }

    pub fn error(&self) -> WatchBudget {
        WatchBudget::from_millis(self.error_timeout_ms, self.error_interval_ms)
    }

    pub fn upload_started(&self) -> WatchBudget {
        WatchBudget::from_millis(self.upload_started_timeout_ms, self.upload_started_interval_ms)
    }

    pub fn upload_done(&self) -> WatchBudget {
        WatchBudget::from_millis(self.upload_done_timeout_ms, self.upload_done_interval_ms)
    }

    pub fn server_connected(&self) -> WatchBudget {
        WatchBudget::from_millis(self.server_connected_timeout_ms, self.server_connected_interval_ms)
    }

    pub fn link(&self) -> WatchBudget {
        WatchBudget::from_millis(self.link_timeout_ms, self.link_interval_ms)
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ProjectConfig {
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub launcher: LauncherConfig,
    #[serde(default)]
    pub budgets: BudgetsConfig,
    #[serde(default)]
    pub tracker_log: TrackerLogConfig,
}

impl ProjectConfig {
    /// Search upward from `start` for a `.hyperwatch/config.toml` file and
    /// load it. Returns the default config if no file is found.
    pub fn load(start: &Path) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = Self::find_config_file(start) {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let config: ProjectConfig = toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            Ok((config, Some(path)))
        } else {
            Ok((ProjectConfig::default(), None))
        }
    }

    fn find_config_file(start: &Path) -> Option<PathBuf> {
        let mut dir = start.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_DIR).join(CONFIG_FILENAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Resolve credentials, preferring `LT_USERNAME` / `LT_ACCESS_KEY` over
    /// the config file. Errors when neither source provides a value.
    pub fn resolve_credentials(&self) -> Result<Credentials> {
        let username = std::env::var(USERNAME_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.credentials.username.clone())
            .context("no LambdaTest username: set LT_USERNAME or [credentials].username")?;
        let access_key = std::env::var(ACCESS_KEY_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.credentials.access_key.clone())
            .context("no LambdaTest access key: set LT_ACCESS_KEY or [credentials].access_key")?;
        Ok(Credentials { username, access_key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn default_config_values() {
        let config = ProjectConfig::default();
        assert_eq!(config.launcher.program, "hyperexecute");
        assert_eq!(config.launcher.config_path, PathBuf::from("hyperexecute.yaml"));
        assert_eq!(config.launcher.log_path, PathBuf::from("hyperexecute-cli.log"));
        assert!(config.launcher.no_track);
        assert_eq!(config.budgets.trigger_timeout_ms, 10_000);
        assert_eq!(config.budgets.upload_done_timeout_ms, 120_000);
        assert!(config.tracker_log.enabled);
        assert!(config.credentials.username.is_none());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[credentials]
username = "alice"
access_key = "secret"

[launcher]
program = "/opt/hyperexecute"
config_path = "configs/he.yaml"
log_path = "logs/he.log"
no_track = false

[budgets]
trigger_timeout_ms = 2000
trigger_interval_ms = 100
upload_done_timeout_ms = 60000

[tracker_log]
enabled = false
path = "audit.jsonl"
"#;
        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.credentials.username.as_deref(), Some("alice"));
        assert_eq!(config.launcher.program, "/opt/hyperexecute");
        assert!(!config.launcher.no_track);
        assert_eq!(config.budgets.trigger_timeout_ms, 2000);
        assert_eq!(config.budgets.trigger_interval_ms, 100);
        assert_eq!(config.budgets.upload_done_timeout_ms, 60_000);
        // Unspecified budgets keep their defaults.
        assert_eq!(config.budgets.link_timeout_ms, 30_000);
        assert!(!config.tracker_log.enabled);
        assert_eq!(config.tracker_log.path, PathBuf::from("audit.jsonl"));
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[launcher]
program = "hyperexecute-beta"
"#;
        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.launcher.program, "hyperexecute-beta");
        assert!(config.launcher.no_track);
        assert_eq!(config.budgets.error_timeout_ms, 4_000);
    }

    #[test]
    fn budget_accessors_convert_to_durations() {
        let budgets = BudgetsConfig::default();
        assert_eq!(budgets.trigger().timeout.as_millis(), 10_000);
        assert_eq!(budgets.trigger().interval.as_millis(), 500);
        assert_eq!(budgets.upload_done().interval.as_millis(), 2_000);
    }

    #[test]
    fn load_from_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".hyperwatch");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config.toml"),
            r#"
[launcher]
log_path = "custom.log"
"#,
        )
        .unwrap();

        let (config, path) = ProjectConfig::load(tmp.path()).unwrap();
        assert!(path.is_some());
        assert_eq!(config.launcher.log_path, PathBuf::from("custom.log"));
    }

    #[test]
    fn load_returns_default_when_no_file() {
        let tmp = tempfile::tempdir().unwrap();
        let (config, path) = ProjectConfig::load(tmp.path()).unwrap();
        assert!(path.is_none());
        assert_eq!(config.launcher.program, "hyperexecute");
    }

    #[test]
    fn load_walks_up_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".hyperwatch");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config.toml"),
            r#"
[launcher]
program = "hx"
"#,
        )
        .unwrap();

        let nested = tmp.path().join("src").join("deep").join("nested");
        fs::create_dir_all(&nested).unwrap();

        let (config, path) = ProjectConfig::load(&nested).unwrap();
        assert!(path.is_some());
        assert_eq!(config.launcher.program, "hx");
    }

    #[test]
    #[serial]
    fn env_credentials_override_config() {
        let toml = r#"
[credentials]
username = "from-file"
access_key = "file-key"
"#;
        let config: ProjectConfig = toml::from_str(toml).unwrap();

        unsafe {
            std::env::set_var(USERNAME_ENV, "from-env");
            std::env::set_var(ACCESS_KEY_ENV, "env-key");
        }
        let creds = config.resolve_credentials().unwrap();
        unsafe {
            std::env::remove_var(USERNAME_ENV);
            std::env::remove_var(ACCESS_KEY_ENV);
        }

        assert_eq!(creds.username, "from-env");
        assert_eq!(creds.access_key, "env-key");
    }

    #[test]
    #[serial]
    fn file_credentials_used_without_env() {
        let toml = r#"
[credentials]
username = "alice"
access_key = "secret"
"#;
        let config: ProjectConfig = toml::from_str(toml).unwrap();

        unsafe {
            std::env::remove_var(USERNAME_ENV);
            std::env::remove_var(ACCESS_KEY_ENV);
        }
        let creds = config.resolve_credentials().unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.access_key, "secret");
    }

    #[test]
    #[serial]
    fn missing_credentials_is_an_error() {
        unsafe {
            std::env::remove_var(USERNAME_ENV);
            std::env::remove_var(ACCESS_KEY_ENV);
        }
        let config = ProjectConfig::default();
        assert!(config.resolve_credentials().is_err());
    }
}
