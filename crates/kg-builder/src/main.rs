//! Talent knowledge-graph builder
//!
//! Reads a talent catalog, extracts a graph from every entry and commits
//! it to a graph store. Interrupted runs resume where they stopped.
//!
//! # Usage
//!
//! ```bash
//! kg-builder ingest talents.json [--category Warrior] [--dry-run]
//! kg-builder categories talents.json
//! kg-builder checkpoint show talents.json [--category Warrior]
//! kg-builder checkpoint reset talents.json [--category Warrior]
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/kg-builder/config.toml)
//! 3. `--config` file
//! 4. Environment variables (KG_*)
//! 5. CLI flags

use anyhow::Result;
use clap::Parser;

use kg_builder::{handle_categories, handle_checkpoint, handle_ingest, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest(args) => {
            handle_ingest(cli.config.as_deref(), cli.log_level.as_deref(), args).await?;
        }
        Commands::Categories { input } => {
            handle_categories(&input)?;
        }
        Commands::Checkpoint { command } => {
            handle_checkpoint(cli.config.as_deref(), command)?;
        }
    }

    Ok(())
}
