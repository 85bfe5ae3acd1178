//! Error types for the talent knowledge-graph builder.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum KgError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors raised while reading the talent catalog.
///
/// All of these abort a run before any item is processed.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The input file could not be read
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input is not a valid talent catalog
    #[error("Invalid catalog: {0}")]
    Parse(#[from] serde_json::Error),

    /// A category was requested that the catalog does not contain
    #[error("Unknown category '{requested}' (available: {})", available.join(", "))]
    UnknownCategory {
        requested: String,
        available: Vec<String>,
    },
}
