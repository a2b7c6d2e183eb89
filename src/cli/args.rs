//! CLI argument structures

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Grade student batches with a durable fan-out/fan-in workflow
#[derive(Parser)]
#[command(name = "gradeflow")]
#[command(about = "gradeflow - Grade student result batches into degree classifications", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Grade an artifact already in the input container
    Process {
        /// Artifact name in the input container
        artifact: String,
    },

    /// Copy a local file into the input container and grade it
    Submit {
        /// Local tab-separated batch file
        file: PathBuf,

        /// Artifact name to store it under (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Watch the input container and grade every new batch
    Watch {
        /// Quiet period before a changed artifact is ingested
        #[arg(long, default_value = "500ms", value_parser = parse_duration)]
        settle: Duration,
    },

    /// Resume an interrupted orchestration
    Resume {
        /// Instance to resume
        instance_id: String,
    },

    /// Cancel an orchestration
    Cancel {
        /// Instance to cancel
        instance_id: String,
    },

    /// Show one orchestration, or list all of them
    Status {
        /// Instance to show
        instance_id: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn parse_duration(raw: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(raw).map_err(|e| e.to_string())
}
