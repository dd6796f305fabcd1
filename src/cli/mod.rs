// src/cli/mod.rs — CLI definition (clap derive)

pub mod inspect;
pub mod login;
pub mod notify_test;
pub mod run;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "slotwatch",
    about = "Watch reservation listings and get notified when new slots open",
    version
)]
pub struct Cli {
    /// Config file path (default: ~/.slotwatch/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log new slots instead of emailing, and keep snapshots in memory
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Verbose logging (same as SLOTWATCH_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Monitor continuously until Ctrl+C
    Run,
    /// Run a single monitoring cycle and exit
    Once,
    /// Log in and save the session
    Login {
        /// Ignore any saved session
        #[arg(long)]
        fresh: bool,
    },
    /// Show the structure and normalized slots of a saved API response
    Inspect {
        /// JSON file holding a raw availability payload
        file: PathBuf,
        /// Listing id to attribute the slots to
        #[arg(long, default_value = "inspect")]
        listing: String,
    },
    /// Send a sample notification through the configured notifier
    NotifyTest,
}
