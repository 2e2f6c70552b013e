//! metaloop CLI entry point.
//!
//! Binary name: `metaloop`
//!
//! Parses CLI arguments, sets up tracing, wires adapters, then dispatches to
//! the phase command handlers.

mod cli;
mod state;

use clap::Parser;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,metaloop=debug",
        _ => "trace",
    };
    metaloop_observe::tracing_setup::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialise tracing: {e}"))?;

    let result = run(cli).await;
    metaloop_observe::tracing_setup::shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init(&cli.config).await?;
    let mode = cli.output_mode();

    match cli.command {
        Commands::Track => cli::track::track(&state, mode).await?,
        Commands::Learn => cli::learn::learn(&state, mode).await?,
        Commands::Generate { limit } => cli::generate::generate(&state, limit, mode).await?,
        Commands::Cycle { limit } => cli::cycle::cycle(&state, limit, mode).await?,
        Commands::Prompt { action } => {
            cli::prompt::handle_prompt_command(&state, action, cli.json).await?
        }
    }

    Ok(())
}
