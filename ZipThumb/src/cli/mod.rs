//! ZipThumb CLI - Command-line interface for zipmod thumbnail tools

pub mod commands;

use clap::Parser;
use commands::Commands;

#[derive(Parser)]
#[command(name = "zipthumb")]
#[command(about = "ZipThumb: zipmod thumbnail and Unity bundle tools", long_about = None)]
#[command(version = crate::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Run the ZipThumb CLI
pub fn run_cli() -> anyhow::Result<()> {
    // Setup logging
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    cli.command.execute()?;

    Ok(())
}
