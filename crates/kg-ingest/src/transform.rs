//! Item transformer trait.
//!
//! A transformer turns one item into the graph documents to commit for
//! it. Implementations live outside this crate (LLM extraction,
//! passthrough, test doubles).

use async_trait::async_trait;

use kg_types::{GraphDocument, Item};

use crate::error::TransformError;

/// Converts one item into zero or more graph documents.
///
/// On error nothing observable may have changed; the processor may call
/// `transform` again for the same item.
#[async_trait]
pub trait ItemTransformer: Send + Sync {
    async fn transform(&self, item: &Item) -> Result<Vec<GraphDocument>, TransformError>;

    /// Name used in logs.
    fn name(&self) -> &str;
}
