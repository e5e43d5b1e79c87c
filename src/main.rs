// ABOUTME: Entry point for the kestrel CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use kestrel::config;
use kestrel::error::Result;
use kestrel::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    if let Err(e) = run(cli.command, mode) {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

fn run(command: Commands, mode: OutputMode) -> Result<()> {
    let output = Output::new(mode);
    match command {
        Commands::Init { force } => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Run { plan, undeploy } => commands::run(plan.as_deref(), undeploy, output),
        Commands::Stages { plan } => commands::stages(plan.as_deref(), output),
        Commands::Deployers { plan, stage, times } => {
            commands::deployers(plan.as_deref(), stage.as_deref(), times, output)
        }
    }
}
