//! CLI argument parsing for the graph builder.
//!
//! CLI flags override all other config sources.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use kg_types::GraphBackend;

/// Talent knowledge-graph builder
///
/// Extracts graph documents from a talent catalog and commits them to a
/// graph store, resuming interrupted runs from a checkpoint.
#[derive(Parser, Debug)]
#[command(name = "kg-builder")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/kg-builder/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Builder commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a talent catalog into the graph store
    Ingest(IngestArgs),

    /// List the categories of a talent catalog
    Categories {
        /// Talent catalog (JSON)
        input: PathBuf,
    },

    /// Inspect or clear a run's checkpoint
    Checkpoint {
        #[command(subcommand)]
        command: CheckpointCommands,
    },
}

/// Arguments for `ingest`
#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// Talent catalog (JSON)
    pub input: PathBuf,

    /// Only ingest this category
    #[arg(long)]
    pub category: Option<String>,

    /// Checkpoint file (default: next to the input or in checkpoint_dir)
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Attempts per item before giving up
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Delay between attempts in milliseconds
    #[arg(long)]
    pub retry_delay_ms: Option<u64>,

    /// Graph store backend
    #[arg(long, value_enum)]
    pub backend: Option<BackendArg>,

    /// Output file for the jsonl backend
    #[arg(short, long)]
    pub output: Option<String>,

    /// Extractor provider (openai, anthropic, passthrough)
    #[arg(long)]
    pub provider: Option<String>,

    /// Do not store source passages alongside extracted graphs
    #[arg(long)]
    pub no_source: bool,

    /// Extract without writing to the graph store or the checkpoint
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Log progress every N items
    #[arg(long, default_value = "25")]
    pub progress_every: usize,
}

/// Graph backends selectable on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendArg {
    Jsonl,
    Neo4j,
}

impl From<BackendArg> for GraphBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Jsonl => GraphBackend::Jsonl,
            BackendArg::Neo4j => GraphBackend::Neo4j,
        }
    }
}

/// Checkpoint subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum CheckpointCommands {
    /// Show the committed indices of a run
    Show {
        /// Talent catalog (JSON) the run reads
        input: PathBuf,

        /// Category the run is restricted to
        #[arg(long)]
        category: Option<String>,

        /// Checkpoint file (overrides the derived location)
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },

    /// Delete a run's checkpoint so the next run starts over
    Reset {
        /// Talent catalog (JSON) the run reads
        input: PathBuf,

        /// Category the run is restricted to
        #[arg(long)]
        category: Option<String>,

        /// Checkpoint file (overrides the derived location)
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },
}
