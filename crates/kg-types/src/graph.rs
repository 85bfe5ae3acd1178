//! Graph documents: the commit unit produced by extraction.
//!
//! A document holds the nodes and relationships extracted from one
//! source passage, plus that passage itself so a sink can attach
//! provenance when asked to.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::item::Item;

/// A node in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Node identifier, unique within its type
    pub id: String,

    /// Node label (e.g. "Talent", "Buff")
    #[serde(rename = "type")]
    pub node_type: String,

    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl GraphNode {
    /// Create a node without properties.
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Add a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Reference to this node for use in relationships.
    pub fn node_ref(&self) -> NodeRef {
        NodeRef {
            id: self.id.clone(),
            node_type: self.node_type.clone(),
        }
    }
}

/// Reference to a node by id and type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
}

impl NodeRef {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
        }
    }
}

/// A directed relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRelationship {
    pub source: NodeRef,
    pub target: NodeRef,

    /// Relationship type (e.g. "GRANTS", "MODIFIES")
    #[serde(rename = "type")]
    pub rel_type: String,

    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl GraphRelationship {
    pub fn new(source: NodeRef, target: NodeRef, rel_type: impl Into<String>) -> Self {
        Self {
            source,
            target,
            rel_type: rel_type.into(),
            properties: BTreeMap::new(),
        }
    }
}

/// The passage a graph document was extracted from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl SourceDocument {
    /// Build the source document for an item.
    pub fn from_item(item: &Item) -> Self {
        Self {
            id: item.source_id(),
            text: item.payload.clone(),
            metadata: item.metadata.clone(),
        }
    }
}

/// Nodes and relationships extracted from one source passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub relationships: Vec<GraphRelationship>,
    pub source: SourceDocument,
}

impl GraphDocument {
    /// Create an empty document for the given source.
    pub fn new(source: SourceDocument) -> Self {
        Self {
            nodes: Vec::new(),
            relationships: Vec::new(),
            source,
        }
    }

    /// True when nothing was extracted.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }

    /// Drop relationships whose endpoints are not nodes of this document.
    ///
    /// Returns the number of relationships removed.
    pub fn retain_connected(&mut self) -> usize {
        let before = self.relationships.len();
        let nodes = &self.nodes;
        let known = |r: &NodeRef| nodes.iter().any(|n| n.id == r.id && n.node_type == r.node_type);
        self.relationships
            .retain(|rel| known(&rel.source) && known(&rel.target));
        before - self.relationships.len()
    }
}
