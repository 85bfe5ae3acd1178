//! Typed talent catalog and its flattening adapter.
//!
//! The input is a JSON object keyed by category (a class name), each
//! value an object keyed by sub-category whose values are lists of
//! `[name, description]` pairs, optionally grouped one level deeper:
//!
//! ```json
//! {
//!   "Warrior": {
//!     "class_nodes": [["Charge", "Charge to an enemy."]],
//!     "Arms": [[["Mortal Strike", "A vicious strike."]], [["Overpower", "..."]]]
//!   }
//! }
//! ```
//!
//! Flattening walks categories and sub-categories in lexicographic order
//! and entries in file order, so the same file always yields the same
//! item sequence.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::item::Item;

/// A single `[name, description]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct TalentEntry {
    pub name: String,
    pub description: String,
}

impl From<(String, String)> for TalentEntry {
    fn from((name, description): (String, String)) -> Self {
        Self { name, description }
    }
}

impl From<TalentEntry> for (String, String) {
    fn from(entry: TalentEntry) -> Self {
        (entry.name, entry.description)
    }
}

impl TalentEntry {
    /// Passage text handed to extraction.
    pub fn passage(&self) -> String {
        format!("{}: {}", self.name.trim(), self.description.trim())
    }

    fn is_blank(&self) -> bool {
        self.name.trim().is_empty() && self.description.trim().is_empty()
    }
}

/// Entries of one sub-category, either flat or grouped (e.g. by talent row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TalentEntries {
    Flat(Vec<TalentEntry>),
    Grouped(Vec<Vec<TalentEntry>>),
}

impl TalentEntries {
    /// Iterate entries in file order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &TalentEntry> + '_> {
        match self {
            TalentEntries::Flat(entries) => Box::new(entries.iter()),
            TalentEntries::Grouped(groups) => Box::new(groups.iter().flatten()),
        }
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Talent data for every category in the input file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TalentCatalog {
    categories: BTreeMap<String, BTreeMap<String, TalentEntries>>,
}

impl TalentCatalog {
    /// Read and validate a catalog file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse a catalog from JSON text.
    pub fn parse(text: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Category names in flattening order.
    pub fn categories(&self) -> Vec<&str> {
        self.categories.keys().map(String::as_str).collect()
    }

    /// Number of non-blank entries in a category.
    pub fn entry_count(&self, category: &str) -> usize {
        self.categories
            .get(category)
            .map(|subs| {
                subs.values()
                    .map(|entries| entries.iter().filter(|e| !e.is_blank()).count())
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Flatten the catalog into the ordered item sequence.
    ///
    /// With `Some(category)` only that category is emitted; an unknown
    /// category is an error. Blank entries are dropped.
    pub fn items(&self, category: Option<&str>) -> Result<Vec<Item>, CatalogError> {
        let selected: Vec<(&String, &BTreeMap<String, TalentEntries>)> = match category {
            Some(name) => {
                let (key, subs) = self.categories.get_key_value(name).ok_or_else(|| {
                    CatalogError::UnknownCategory {
                        requested: name.to_string(),
                        available: self.categories.keys().cloned().collect(),
                    }
                })?;
                vec![(key, subs)]
            }
            None => self.categories.iter().collect(),
        };

        let mut items = Vec::new();
        for (category, subs) in selected {
            for (subcategory, entries) in subs {
                for entry in entries.iter().filter(|e| !e.is_blank()) {
                    let item = Item::new(items.len(), entry.passage())
                        .with_metadata("category", category.as_str())
                        .with_metadata("subcategory", subcategory.as_str())
                        .with_metadata("name", entry.name.trim());
                    items.push(item);
                }
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Warrior": {
            "class_nodes": [["Charge", "Charge to an enemy."], ["Pummel", "Interrupt."]],
            "Arms": [
                [["Mortal Strike", "A vicious strike."]],
                [["Overpower", "Overpower the enemy."]]
            ]
        },
        "Mage": {
            "class_nodes": [["Blink", "Teleport forward."], ["", "  "]]
        }
    }"#;

    #[test]
    fn test_categories_sorted() {
        let catalog = TalentCatalog::parse(SAMPLE).unwrap();
        assert_eq!(catalog.categories(), vec!["Mage", "Warrior"]);
    }

    #[test]
    fn test_items_for_category_in_stable_order() {
        let catalog = TalentCatalog::parse(SAMPLE).unwrap();
        let items = catalog.items(Some("Warrior")).unwrap();

        let payloads: Vec<&str> = items.iter().map(|i| i.payload.as_str()).collect();
        assert_eq!(
            payloads,
            vec![
                "Mortal Strike: A vicious strike.",
                "Overpower: Overpower the enemy.",
                "Charge: Charge to an enemy.",
                "Pummel: Interrupt.",
            ]
        );
        assert_eq!(items[0].index, 0);
        assert_eq!(items[3].index, 3);
        assert_eq!(items[0].metadata.get("subcategory").unwrap(), "Arms");
        assert_eq!(items[2].metadata.get("category").unwrap(), "Warrior");
    }

    #[test]
    fn test_items_all_categories_skip_blank_entries() {
        let catalog = TalentCatalog::parse(SAMPLE).unwrap();
        let items = catalog.items(None).unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(items[0].payload, "Blink: Teleport forward.");
        assert_eq!(catalog.entry_count("Mage"), 1);
        assert_eq!(catalog.entry_count("Warrior"), 4);
    }

    #[test]
    fn test_unknown_category() {
        let catalog = TalentCatalog::parse(SAMPLE).unwrap();
        let err = catalog.items(Some("Druid")).unwrap_err();
        match err {
            CatalogError::UnknownCategory { requested, available } => {
                assert_eq!(requested, "Druid");
                assert_eq!(available, vec!["Mage".to_string(), "Warrior".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_malformed_pairs() {
        let err = TalentCatalog::parse(r#"{"Warrior": {"class_nodes": [["Charge"]]}}"#);
        assert!(matches!(err, Err(CatalogError::Parse(_))));

        let err = TalentCatalog::parse(r#"{"Warrior": ["Charge", "x"]}"#);
        assert!(matches!(err, Err(CatalogError::Parse(_))));
    }

    #[test]
    fn test_from_path_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = TalentCatalog::from_path(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("talents.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let catalog = TalentCatalog::from_path(&path).unwrap();
        assert_eq!(catalog.items(Some("Mage")).unwrap().len(), 1);
    }
}
