use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "hyperwatch",
    about = "Log-driven job progress tracking for the HyperExecute cloud test CLI",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Trigger a HyperExecute job and report its status
    Run {
        /// Keep polling and printing status until the job yields a link or
        /// terminates (Ctrl-C abandons tracking, not the remote job)
        #[arg(long)]
        follow: bool,

        /// Seconds between status polls in follow mode
        #[arg(long, default_value = "5")]
        poll_secs: u64,

        /// Override the HyperExecute YAML path from config
        #[arg(long)]
        yaml: Option<PathBuf>,
    },

    /// Show project configuration
    Config {
        /// Emit JSON instead of the human-readable listing
        #[arg(long)]
        json: bool,
    },
}
