//! Relaycam CLI
//!
//! A virtual video device that relays producer frames and falls back to a
//! synthetic test signal.
//!
//! # Usage
//!
//! ```bash
//! # Run the device daemon with the source emitting
//! relaycam run
//!
//! # From another terminal, query it
//! relaycam status
//!
//! # Shut the daemon down
//! relaycam shutdown
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Relaycam - virtual video device with frame relay
#[derive(Parser)]
#[command(name = "relaycam")]
#[command(version)]
#[command(about = "Virtual video device with frame relay and a synthetic fallback signal", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the device daemon in the foreground
    Run(commands::RunArgs),

    /// Start (or join) the source endpoint on a running daemon
    Start,

    /// Stop the source endpoint on a running daemon
    Stop,

    /// Show status of the running daemon
    Status,

    /// Show frame counters of the running daemon
    Stats,

    /// Shut the running daemon down
    Shutdown,

    /// Manage configuration files
    Config(commands::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("relaycam_core={}", level).parse()?)
                .add_directive(format!("relaycam_cli={}", level).parse()?),
        )
        .with_target(false)
        .init();

    // Run the appropriate command
    match cli.command {
        Commands::Run(args) => commands::run(args).await?,
        Commands::Start => commands::start().await?,
        Commands::Stop => commands::stop().await?,
        Commands::Status => commands::status().await?,
        Commands::Stats => commands::stats().await?,
        Commands::Shutdown => commands::shutdown().await?,
        Commands::Config(args) => commands::config(args).await?,
    }

    Ok(())
}
