// src/main.rs — slotwatch entry point

use clap::Parser;

use slotwatch::cli::{Cli, Commands};
use slotwatch::infra::config::Config;
use slotwatch::infra::logger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging (respects RUST_LOG / SLOTWATCH_LOG)
    logger::init_logging(if cli.verbose { "debug" } else { "info" });

    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Load config (falls back to defaults if no config.toml)
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Run => slotwatch::cli::run::run_monitor(&config, cli.dry_run).await,
        Commands::Once => slotwatch::cli::run::run_once(&config, cli.dry_run).await,
        Commands::Login { fresh } => slotwatch::cli::login::run_login(&config, fresh).await,
        Commands::Inspect { file, listing } => {
            slotwatch::cli::inspect::run_inspect(&file, &listing, config.monitor.missing_fields)
        }
        Commands::NotifyTest => {
            slotwatch::cli::notify_test::run_notify_test(&config, cli.dry_run).await
        }
    }
}
