//! # kg-types
//!
//! Shared domain types for the talent knowledge-graph builder.
//!
//! This crate defines the data structures passed between the ingestion
//! pipeline and its collaborators:
//! - Items: ordered units of work produced from the talent catalog
//! - Graph documents: nodes, relationships and provenance ready for a graph store
//! - Catalog: the typed talent-data input and its flattening adapter
//! - Settings: layered configuration for the builder binary
//!
//! ## Usage
//!
//! ```rust
//! use kg_types::{Item, TalentCatalog};
//!
//! let catalog: TalentCatalog = serde_json::from_str(
//!     r#"{"Warrior": {"class_nodes": [["Charge", "Charge to an enemy."]]}}"#,
//! ).unwrap();
//! let items: Vec<Item> = catalog.items(Some("Warrior")).unwrap();
//! assert_eq!(items[0].payload, "Charge: Charge to an enemy.");
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod graph;
pub mod item;

pub use catalog::{TalentCatalog, TalentEntries, TalentEntry};
pub use config::{
    DelayStrategyKind, ExtractorSettings, GraphBackend, GraphSettings, RetrySettings, Settings,
};
pub use error::{CatalogError, KgError};
pub use graph::{GraphDocument, GraphNode, GraphRelationship, NodeRef, SourceDocument};
pub use item::{items_from_passages, Item};
