//! Tickwire CLI - Command-line interface for Tickwire
//!
//! Usage:
//!   tickwire validate <manifest>                 - Check a wiring
//!   tickwire plan <manifest> [--format dot]      - Print the execution plan
//!   tickwire run <manifest> --cycles 3 -g desk-a - Simulate cycles

use clap::{Parser, Subcommand};
use cli::commands::{PlanCommand, RunCommand, ValidateCommand};

#[derive(Parser)]
#[command(name = "tickwire")]
#[command(about = "Tickwire - Scoped event bus and statically validated worker wiring")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate worker declarations against wiring rules
    Validate(ValidateCommand),
    /// Print the execution plan of a wiring
    Plan(PlanCommand),
    /// Simulate processing cycles
    Run(RunCommand),
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate(cmd) => cmd.run(),
        Commands::Plan(cmd) => cmd.run(),
        Commands::Run(cmd) => cmd.run(),
    }
}
