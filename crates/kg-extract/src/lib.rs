//! Graph extraction for talent passages.
//!
//! Provides [`ItemTransformer`] implementations:
//! - [`ApiExtractor`]: asks an OpenAI-compatible or Anthropic model for
//!   nodes and relationships
//! - [`PassthroughExtractor`]: deterministic, model-free documents for
//!   offline runs and tests

mod api;
mod passthrough;
mod prompt;

pub use api::{ApiExtractor, ApiExtractorConfig, ApiProvider};
pub use passthrough::PassthroughExtractor;
pub use prompt::{build_extraction_prompt, parse_extraction, TypeFilter};

use std::sync::Arc;

use kg_ingest::{ItemTransformer, TransformError};
use kg_types::ExtractorSettings;

/// Build the transformer described by configuration.
pub fn extractor_from_settings(
    settings: &ExtractorSettings,
) -> Result<Arc<dyn ItemTransformer>, TransformError> {
    match settings.provider.as_str() {
        "passthrough" => Ok(Arc::new(PassthroughExtractor::new())),
        _ => {
            let config = ApiExtractorConfig::from_settings(settings)?;
            Ok(Arc::new(ApiExtractor::new(config)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_from_settings() {
        let settings = ExtractorSettings {
            provider: "passthrough".to_string(),
            ..Default::default()
        };
        let extractor = extractor_from_settings(&settings).unwrap();
        assert_eq!(extractor.name(), "passthrough");
    }

    #[test]
    fn test_api_requires_key() {
        let settings = ExtractorSettings::default();
        let err = extractor_from_settings(&settings).err().unwrap();
        assert!(matches!(err, TransformError::Config(_)));
    }
}
