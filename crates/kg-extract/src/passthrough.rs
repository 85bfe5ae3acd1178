//! Model-free extractor.

use async_trait::async_trait;

use kg_ingest::{ItemTransformer, TransformError};
use kg_types::{GraphDocument, GraphNode, GraphRelationship, Item, SourceDocument};

/// Extractor that maps each item to a fixed small graph.
///
/// Produces one node for the item (id = its `name` metadata or the whole
/// payload) carrying the description, plus a `Category` node and an
/// `IN_CATEGORY` edge when the item has a category. Useful for loading
/// raw talent text into a store without a model, and in tests.
pub struct PassthroughExtractor {
    node_type: String,
}

impl PassthroughExtractor {
    pub fn new() -> Self {
        Self {
            node_type: "Talent".to_string(),
        }
    }

    /// Use a custom label for item nodes.
    pub fn with_node_type(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
        }
    }
}

impl Default for PassthroughExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ItemTransformer for PassthroughExtractor {
    async fn transform(&self, item: &Item) -> Result<Vec<GraphDocument>, TransformError> {
        let name = item
            .metadata
            .get("name")
            .cloned()
            .unwrap_or_else(|| item.payload.clone());
        let description = item
            .payload
            .split_once(": ")
            .map(|(_, d)| d.to_string())
            .unwrap_or_default();

        let mut node = GraphNode::new(name, self.node_type.clone());
        if !description.is_empty() {
            node = node.with_property("description", description);
        }
        if let Some(sub) = item.metadata.get("subcategory") {
            node = node.with_property("subcategory", sub.clone());
        }

        let mut doc = GraphDocument::new(SourceDocument::from_item(item));
        if let Some(category) = item.metadata.get("category") {
            let category = GraphNode::new(category.clone(), "Category");
            doc.relationships.push(GraphRelationship::new(
                node.node_ref(),
                category.node_ref(),
                "IN_CATEGORY",
            ));
            doc.nodes.push(node);
            doc.nodes.push(category);
        } else {
            doc.nodes.push(node);
        }

        Ok(vec![doc])
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_item_with_category() {
        let item = Item::new(0, "Charge: Charge to an enemy.")
            .with_metadata("category", "Warrior")
            .with_metadata("subcategory", "class_nodes")
            .with_metadata("name", "Charge");

        let docs = PassthroughExtractor::new().transform(&item).await.unwrap();
        assert_eq!(docs.len(), 1);
        let doc = &docs[0];
        assert_eq!(doc.nodes[0].id, "Charge");
        assert_eq!(doc.nodes[0].properties["description"], "Charge to an enemy.");
        assert_eq!(doc.nodes[1].node_type, "Category");
        assert_eq!(doc.relationships[0].rel_type, "IN_CATEGORY");
    }

    #[tokio::test]
    async fn test_plain_item() {
        let docs = PassthroughExtractor::with_node_type("Passage")
            .transform(&Item::new(3, "just text"))
            .await
            .unwrap();
        assert_eq!(docs[0].nodes.len(), 1);
        assert_eq!(docs[0].nodes[0].id, "just text");
        assert_eq!(docs[0].nodes[0].node_type, "Passage");
        assert!(docs[0].relationships.is_empty());
    }
}
