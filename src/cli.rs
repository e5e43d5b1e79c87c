// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kestrel")]
#[command(about = "Stage-gated deployer pipeline driven by a YAML deployment plan")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print final results
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new kestrel.yml deployment plan
    Init {
        /// Overwrite an existing plan
        #[arg(long)]
        force: bool,
    },

    /// Deploy every planned deployment, then check completion
    Run {
        /// Plan file (default: discovered in the current directory)
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Undeploy everything after the check
        #[arg(long)]
        undeploy: bool,
    },

    /// List stages in order
    Stages {
        #[arg(short, long)]
        plan: Option<PathBuf>,
    },

    /// List registered deployers
    Deployers {
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Only this stage
        #[arg(short, long)]
        stage: Option<String>,

        /// Deploy the plan and show per-deployer timings instead
        #[arg(long)]
        times: bool,
    },
}
