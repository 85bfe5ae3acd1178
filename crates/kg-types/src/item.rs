//! Work items fed to the ingestion pipeline.
//!
//! An item is identified by its zero-based position in the ordered
//! sequence produced for a run. The checkpoint records positions, so
//! the sequence must be reproduced in the same order on every run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One unit of work: a short text passage plus provenance metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Position in the run's item sequence
    pub index: usize,

    /// Text handed to the transformer
    pub payload: String,

    /// Provenance (category, subcategory, name, ...)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Item {
    /// Create a new item without metadata.
    pub fn new(index: usize, payload: impl Into<String>) -> Self {
        Self {
            index,
            payload: payload.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Stable identifier used for the source document of this item.
    pub fn source_id(&self) -> String {
        match self.metadata.get("category") {
            Some(category) => format!("{}#{}", category, self.index),
            None => format!("item#{}", self.index),
        }
    }
}

/// Build an item sequence from plain passages, numbering them in order.
pub fn items_from_passages<I, S>(passages: I) -> Vec<Item>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    passages
        .into_iter()
        .enumerate()
        .map(|(index, text)| Item::new(index, text))
        .collect()
}
