//! CLI command definitions and dispatch for the `metaloop` binary.
//!
//! Uses clap derive macros for argument parsing. Each flywheel phase is a
//! top-level command; `cycle` runs all three in order.

pub mod cycle;
pub mod generate;
pub mod learn;
pub mod output;
pub mod prompt;
pub mod sink;
pub mod track;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use output::OutputMode;

/// Generate, track and learn from page meta descriptions.
#[derive(Parser)]
#[command(name = "metaloop", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "metaloop.toml", env = "METALOOP_CONFIG")]
    pub config: PathBuf,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress phase summaries and all logging below error level.
    #[arg(long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Styled
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify previously generated descriptions against fresh metrics.
    Track,

    /// Learn patterns from tracked outcomes and rewrite the quality guidance.
    Learn,

    /// Generate descriptions for the candidates file.
    Generate {
        /// Only process the first N candidates.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Run track, learn and generate in order.
    Cycle {
        /// Only process the first N candidates in the generate phase.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Inspect prompt state.
    Prompt {
        #[command(subcommand)]
        action: PromptCommand,
    },
}

#[derive(Subcommand)]
pub enum PromptCommand {
    /// Print the effective system prompt.
    Show,

    /// List archived quality-guidance backups, oldest first.
    Backups,

    /// Print one archived quality-guidance backup.
    Backup {
        /// Backup key, e.g. `quality.20261016T080000`.
        key: String,
    },
}
