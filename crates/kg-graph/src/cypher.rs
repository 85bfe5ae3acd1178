//! Cypher statements for committing graph documents.
//!
//! Every write is a `MERGE` keyed on `(label, id)`, so re-committing a
//! document after a crash between commit and checkpoint does not
//! duplicate nodes or relationships.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Map, Value};

use kg_types::GraphDocument;

/// Label for source passages.
pub const DOCUMENT_LABEL: &str = "Document";

/// Relationship from a source passage to the nodes extracted from it.
pub const MENTIONS: &str = "MENTIONS";

/// One parameterized Cypher statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub statement: String,
    pub parameters: Value,
}

/// Quote a label or relationship type for interpolation into Cypher.
///
/// Labels cannot be parameters, so they are backtick-quoted with inner
/// backticks doubled. Blank names fall back to `fallback`.
pub fn quote_identifier(name: &str, fallback: &str) -> String {
    let name = name.trim();
    let name = if name.is_empty() { fallback } else { name };
    format!("`{}`", name.replace('`', "``"))
}

/// Neo4j properties must be primitives or arrays of primitives; nested
/// values are stored as JSON text.
pub fn property_map(properties: &BTreeMap<String, Value>) -> Value {
    let map: Map<String, Value> = properties
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), flatten_value(v)))
        .collect();
    Value::Object(map)
}

fn flatten_value(value: &Value) -> Value {
    match value {
        Value::Object(_) => Value::String(value.to_string()),
        Value::Array(items) if items.iter().all(is_primitive) => value.clone(),
        Value::Array(_) => Value::String(value.to_string()),
        other => other.clone(),
    }
}

fn is_primitive(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_))
}

/// Build the statements that persist `units`, in execution order.
pub fn statements_for(units: &[GraphDocument], include_source: bool) -> Vec<Statement> {
    let mut statements = Vec::new();

    for doc in units {
        for node in &doc.nodes {
            statements.push(Statement {
                statement: format!(
                    "MERGE (n:{} {{id: $id}}) SET n += $properties",
                    quote_identifier(&node.node_type, "Node")
                ),
                parameters: json!({
                    "id": node.id,
                    "properties": property_map(&node.properties),
                }),
            });
        }

        for rel in &doc.relationships {
            statements.push(Statement {
                statement: format!(
                    "MERGE (s:{} {{id: $source_id}}) MERGE (t:{} {{id: $target_id}}) \
                     MERGE (s)-[r:{}]->(t) SET r += $properties",
                    quote_identifier(&rel.source.node_type, "Node"),
                    quote_identifier(&rel.target.node_type, "Node"),
                    quote_identifier(&rel.rel_type, "RELATED_TO"),
                ),
                parameters: json!({
                    "source_id": rel.source.id,
                    "target_id": rel.target.id,
                    "properties": property_map(&rel.properties),
                }),
            });
        }

        if include_source {
            statements.push(Statement {
                statement: format!(
                    "MERGE (d:{} {{id: $id}}) SET d.text = $text, d += $metadata",
                    quote_identifier(DOCUMENT_LABEL, DOCUMENT_LABEL)
                ),
                parameters: json!({
                    "id": doc.source.id,
                    "text": doc.source.text,
                    "metadata": doc.source.metadata,
                }),
            });

            for node in &doc.nodes {
                statements.push(Statement {
                    statement: format!(
                        "MATCH (d:{} {{id: $doc_id}}) MATCH (n:{} {{id: $id}}) \
                         MERGE (d)-[:{}]->(n)",
                        quote_identifier(DOCUMENT_LABEL, DOCUMENT_LABEL),
                        quote_identifier(&node.node_type, "Node"),
                        MENTIONS,
                    ),
                    parameters: json!({
                        "doc_id": doc.source.id,
                        "id": node.id,
                    }),
                });
            }
        }
    }

    statements
}
