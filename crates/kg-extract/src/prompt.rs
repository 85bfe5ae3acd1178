//! Extraction prompt and response parsing.

use serde::Deserialize;

use kg_ingest::TransformError;
use kg_types::{GraphDocument, GraphNode, GraphRelationship, Item, SourceDocument};

/// Node and relationship types an extractor may emit.
///
/// Empty lists mean "anything goes". Matching ignores case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeFilter {
    pub nodes: Vec<String>,
    pub relationships: Vec<String>,
}

impl TypeFilter {
    pub fn new(nodes: Vec<String>, relationships: Vec<String>) -> Self {
        Self {
            nodes,
            relationships,
        }
    }

    pub fn allows_node(&self, node_type: &str) -> bool {
        allowed(&self.nodes, node_type)
    }

    pub fn allows_relationship(&self, rel_type: &str) -> bool {
        allowed(&self.relationships, rel_type)
    }
}

fn allowed(list: &[String], value: &str) -> bool {
    list.is_empty() || list.iter().any(|t| t.eq_ignore_ascii_case(value))
}

/// Build the prompt asking a model for the graph contained in `item`.
pub fn build_extraction_prompt(item: &Item, filter: &TypeFilter) -> String {
    let context = item
        .metadata
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join("\n");

    let node_rule = if filter.nodes.is_empty() {
        "Choose concise node types (e.g. Talent, Ability, Buff, Resource).".to_string()
    } else {
        format!("Only use these node types: {}.", filter.nodes.join(", "))
    };
    let rel_rule = if filter.relationships.is_empty() {
        "Choose concise UPPER_SNAKE_CASE relationship types.".to_string()
    } else {
        format!(
            "Only use these relationship types: {}.",
            filter.relationships.join(", ")
        )
    };

    let passage = &item.payload;
    format!(
        r#"Extract a knowledge graph from this game talent description.

CONTEXT:
{context}

PASSAGE:
{passage}

Provide your response in JSON format:
{{
  "nodes": [{{"id": "Name", "type": "NodeType", "properties": {{}}}}],
  "relationships": [
    {{"source": {{"id": "Name", "type": "NodeType"}},
      "target": {{"id": "Other", "type": "NodeType"}},
      "type": "RELATIONSHIP", "properties": {{}}}}
  ]
}}

Guidelines:
- {node_rule}
- {rel_rule}
- Use the in-game name as the node id
- Only reference nodes that are listed in "nodes""#
    )
}

#[derive(Debug, Deserialize)]
struct ExtractionResponse {
    #[serde(default)]
    nodes: Vec<GraphNode>,
    #[serde(default)]
    relationships: Vec<GraphRelationship>,
}

/// Parse a model response into a graph document for `item`.
///
/// Types outside `filter` are dropped, as are relationships whose
/// endpoints did not survive. Returns `None` when nothing is left.
pub fn parse_extraction(
    response: &str,
    item: &Item,
    filter: &TypeFilter,
) -> Result<Option<GraphDocument>, TransformError> {
    let json_str = extract_json(response);
    let parsed: ExtractionResponse = serde_json::from_str(&json_str)
        .map_err(|e| TransformError::Parse(format!("Failed to parse graph JSON: {}", e)))?;

    let mut doc = GraphDocument::new(SourceDocument::from_item(item));
    doc.nodes = parsed
        .nodes
        .into_iter()
        .filter(|n| !n.id.trim().is_empty() && filter.allows_node(&n.node_type))
        .collect();
    doc.relationships = parsed
        .relationships
        .into_iter()
        .filter(|r| filter.allows_relationship(&r.rel_type))
        .collect();
    doc.retain_connected();

    if doc.is_empty() {
        Ok(None)
    } else {
        Ok(Some(doc))
    }
}

/// Extract JSON object from text (handles markdown code blocks).
fn extract_json(text: &str) -> String {
    if let Some(start) = text.find("```json") {
        if let Some(end) = text[start + 7..].find("```") {
            return text[start + 7..start + 7 + end].trim().to_string();
        }
    }

    if let Some(start) = text.find("```") {
        if let Some(end) = text[start + 3..].find("```") {
            return text[start + 3..start + 3 + end].trim().to_string();
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return text[start..=end].to_string();
        }
    }

    text.to_string()
}
