use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use hyperwatch::cli::{Cli, Command};
use hyperwatch::config::ProjectConfig;
use hyperwatch::launcher::HyperExecuteLauncher;
use hyperwatch::log::TrackerLog;
use hyperwatch::tracker::{JobTracker, TrackerConfig};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let is_config_command = matches!(&cli.command, Command::Config { .. });

    let filter = match cli.verbose {
        0 if is_config_command => "hyperwatch=warn",
        0 => "hyperwatch=info",
        1 => "hyperwatch=debug",
        _ => "hyperwatch=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cwd = std::env::current_dir().context("failed to get current directory (was it deleted?)")?;
    let (config, config_path) = ProjectConfig::load(&cwd)?;

    if !is_config_command || cli.verbose > 0 {
        match config_path {
            Some(ref p) => info!("loaded config from {}", p.display()),
            None => info!("no .hyperwatch/config.toml found, using defaults"),
        }
    }

    match cli.command {
        Command::Run { follow, poll_secs, yaml } => run_job(config, yaml, follow, poll_secs),
        Command::Config { json } => {
            if json {
                println!("{}", render_config_json(&config, config_path.as_deref())?);
            } else {
                print!("{}", render_config_human(&config, config_path.as_deref()));
            }
            Ok(())
        }
    }
}

/// Trigger a job and, in follow mode, stand in for the external controller:
/// call `advance()` on an interval and print each status string until a
/// terminal stage or Ctrl-C.
fn run_job(
    config: ProjectConfig,
    yaml_override: Option<PathBuf>,
    follow: bool,
    poll_secs: u64,
) -> Result<()> {
    let credentials = config.resolve_credentials()?;
    let launcher = HyperExecuteLauncher::new(
        Some(config.launcher.program.clone()),
        config.launcher.no_track,
    );
    let audit = if config.tracker_log.enabled {
        Some(TrackerLog::new(&config.tracker_log.path)?)
    } else {
        None
    };
    let yaml_path = yaml_override.unwrap_or_else(|| config.launcher.config_path.clone());

    let mut tracker = JobTracker::new(
        TrackerConfig {
            log_path: config.launcher.log_path.clone(),
            yaml_path,
            budgets: config.budgets,
        },
        credentials,
        Box::new(launcher),
        audit,
    );

    println!("{}", tracker.run());
    if !follow {
        return Ok(());
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        let token = tracker.cancel_token();
        ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::SeqCst);
            token.cancel();
        })
        .context("failed to install Ctrl-C handler")?;
    }

    while !tracker.is_terminal() && !interrupted.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_secs(poll_secs));
        if interrupted.load(Ordering::SeqCst) {
            break;
        }
        let message = tracker.advance().context("status poll failed")?;
        println!("{message}");
    }

    if interrupted.load(Ordering::SeqCst) {
        println!("Tracking stopped; the remote job keeps running on HyperExecute.");
    }
    Ok(())
}

fn config_source_label(config_path: Option<&Path>) -> String {
    config_path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults — no .hyperwatch/config.toml found)".to_string())
}

fn push_kv(output: &mut String, key: &str, value: impl std::fmt::Display) {
    output.push_str(&format!("  {key:<28} {value}\n"));
}

fn render_config_human(config: &ProjectConfig, config_path: Option<&Path>) -> String {
    let mut output = String::new();

    output.push_str("Credentials\n");
    push_kv(
        &mut output,
        "username",
        config.credentials.username.as_deref().unwrap_or("(none)"),
    );
    push_kv(
        &mut output,
        "access_key",
        if config.credentials.access_key.is_some() { "(set)" } else { "(none)" },
    );
    output.push('\n');

    output.push_str("Launcher\n");
    push_kv(&mut output, "program", &config.launcher.program);
    push_kv(&mut output, "config_path", config.launcher.config_path.display());
    push_kv(&mut output, "log_path", config.launcher.log_path.display());
    push_kv(&mut output, "no_track", config.launcher.no_track);
    output.push('\n');

    output.push_str("Budgets\n");
    push_kv(
        &mut output,
        "trigger",
        format!("{}ms / {}ms", config.budgets.trigger_timeout_ms, config.budgets.trigger_interval_ms),
    );
    push_kv(
        &mut output,
        "error",
        format!("{}ms / {}ms", config.budgets.error_timeout_ms, config.budgets.error_interval_ms),
    );
    push_kv(
        &mut output,
        "upload_started",
        format!(
            "{}ms / {}ms",
            config.budgets.upload_started_timeout_ms, config.budgets.upload_started_interval_ms
        ),
    );
    push_kv(
        &mut output,
        "upload_done",
        format!(
            "{}ms / {}ms",
            config.budgets.upload_done_timeout_ms, config.budgets.upload_done_interval_ms
        ),
    );
    push_kv(
        &mut output,
        "server_connected",
        format!(
            "{}ms / {}ms",
            config.budgets.server_connected_timeout_ms, config.budgets.server_connected_interval_ms
        ),
    );
    push_kv(
        &mut output,
        "link",
        format!("{}ms / {}ms", config.budgets.link_timeout_ms, config.budgets.link_interval_ms),
    );
    output.push('\n');

    output.push_str("Tracker Log\n");
    push_kv(&mut output, "enabled", config.tracker_log.enabled);
    push_kv(&mut output, "path", config.tracker_log.path.display());
    output.push('\n');

    output.push_str("Source Path\n");
    push_kv(&mut output, "path", config_source_label(config_path));

    output
}

fn render_config_json(config: &ProjectConfig, config_path: Option<&Path>) -> Result<String> {
    let payload = serde_json::json!({
        "credentials": {
            "username": config.credentials.username,
            "access_key_set": config.credentials.access_key.is_some()
        },
        "launcher": {
            "program": &config.launcher.program,
            "config_path": config.launcher.config_path.display().to_string(),
            "log_path": config.launcher.log_path.display().to_string(),
            "no_track": config.launcher.no_track
        },
        "budgets": {
            "trigger_timeout_ms": config.budgets.trigger_timeout_ms,
            "trigger_interval_ms": config.budgets.trigger_interval_ms,
            "error_timeout_ms": config.budgets.error_timeout_ms,
            "error_interval_ms": config.budgets.error_interval_ms,
            "upload_started_timeout_ms": config.budgets.upload_started_timeout_ms,
            "upload_started_interval_ms": config.budgets.upload_started_interval_ms,
            "upload_done_timeout_ms": config.budgets.upload_done_timeout_ms,
            "upload_done_interval_ms": config.budgets.upload_done_interval_ms,
            "server_connected_timeout_ms": config.budgets.server_connected_timeout_ms,
            "server_connected_interval_ms": config.budgets.server_connected_interval_ms,
            "link_timeout_ms": config.budgets.link_timeout_ms,
            "link_interval_ms": config.budgets.link_interval_ms
        },
        "tracker_log": {
            "enabled": config.tracker_log.enabled,
            "path": config.tracker_log.path.display().to_string()
        },
        "source_path": config_source_label(config_path)
    });

    serde_json::to_string_pretty(&payload).context("failed to serialize config to JSON")
}
