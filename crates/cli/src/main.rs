//! Redline CLI - configuration checks and menu previews.
//!
//! # Usage
//!
//! ```bash
//! # Validate the environment configuration
//! redline check-config
//!
//! # Preview the sidebar for a role (the demo "override role" consumer)
//! redline nav --role "Front Desk"
//! redline nav --role Technician --json
//!
//! # Check that the hosted backend answers
//! redline ping
//! ```
//!
//! # Commands
//!
//! - `check-config` - Load and validate environment configuration
//! - `nav` - Print the navigation tree a role would see
//! - `ping` - Verify backend reachability

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "redline")]
#[command(author, version, about = "Redline Garage CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the environment configuration
    CheckConfig,
    /// Print the navigation tree a role would see
    Nav {
        /// Role to preview (`Manager`, `Technician`, `Front Desk`).
        /// Unrecognized values preview the documented fallback tree.
        #[arg(short, long)]
        role: Option<String>,

        /// Emit JSON instead of a plain tree
        #[arg(long)]
        json: bool,
    },
    /// Verify the hosted backend answers
    Ping,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::CheckConfig => commands::check::run()?,
        Commands::Nav { role, json } => commands::nav::run(role.as_deref(), json)?,
        Commands::Ping => commands::ping::run().await?,
    }
    Ok(())
}
