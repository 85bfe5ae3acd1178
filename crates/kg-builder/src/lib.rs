//! Talent knowledge-graph builder library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (ingest, categories, checkpoint)

pub mod cli;
pub mod commands;

pub use cli::{BackendArg, CheckpointCommands, Cli, Commands, IngestArgs};
pub use commands::{handle_categories, handle_checkpoint, handle_ingest, resolve_checkpoint_key};
