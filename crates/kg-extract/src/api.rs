//! API-based extractor using OpenAI-compatible or Anthropic endpoints.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use kg_ingest::{ItemTransformer, TransformError};
use kg_types::{ExtractorSettings, GraphDocument, Item};

use crate::prompt::{build_extraction_prompt, parse_extraction, TypeFilter};

/// Wire protocol of the model endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiProvider {
    /// `POST {base}/chat/completions`
    OpenAi,
    /// `POST {base}/messages`
    Anthropic,
}

/// Configuration for API-based extraction.
#[derive(Debug, Clone)]
pub struct ApiExtractorConfig {
    pub provider: ApiProvider,

    /// API base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,

    /// Model to use (e.g., "gpt-4o")
    pub model: String,

    pub api_key: SecretString,

    /// Request timeout
    pub timeout: Duration,

    pub filter: TypeFilter,
}

impl ApiExtractorConfig {
    /// Create config for OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: ApiProvider::OpenAi,
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            api_key: SecretString::from(api_key.into()),
            timeout: Duration::from_secs(60),
            filter: TypeFilter::default(),
        }
    }

    /// Create config for Claude API.
    pub fn claude(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: ApiProvider::Anthropic,
            base_url: "https://api.anthropic.com/v1".to_string(),
            model: model.into(),
            api_key: SecretString::from(api_key.into()),
            timeout: Duration::from_secs(60),
            filter: TypeFilter::default(),
        }
    }

    /// Override the base URL (proxies, Azure deployments, local servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_filter(mut self, filter: TypeFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Build from configuration. The API key is required.
    pub fn from_settings(settings: &ExtractorSettings) -> Result<Self, TransformError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                TransformError::Config(format!(
                    "extractor.api_key is required for provider '{}'",
                    settings.provider
                ))
            })?;

        let mut config = match settings.provider.as_str() {
            "openai" => Self::openai(api_key, settings.model.clone()),
            "anthropic" => Self::claude(api_key, settings.model.clone()),
            other => {
                return Err(TransformError::Config(format!(
                    "unsupported extractor provider '{}'",
                    other
                )))
            }
        };
        if let Some(base_url) = &settings.api_base_url {
            config = config.with_base_url(base_url.clone());
        }
        config.timeout = Duration::from_secs(settings.timeout_secs);
        config.filter = TypeFilter::new(
            settings.allowed_nodes.clone(),
            settings.allowed_relationships.clone(),
        );
        Ok(config)
    }
}

/// API-based extractor implementation.
///
/// Makes a single request per call; retries belong to the batch
/// processor's policy.
pub struct ApiExtractor {
    client: Client,
    config: ApiExtractorConfig,
}

impl ApiExtractor {
    /// Create a new API extractor.
    pub fn new(config: ApiExtractorConfig) -> Result<Self, TransformError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransformError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    async fn make_request(&self, prompt: &str) -> Result<String, TransformError> {
        match self.config.provider {
            ApiProvider::OpenAi => self.make_openai_request(prompt).await,
            ApiProvider::Anthropic => self.make_anthropic_request(prompt).await,
        }
    }

    /// Make OpenAI-compatible API request.
    async fn make_openai_request(&self, prompt: &str) -> Result<String, TransformError> {
        #[derive(Serialize)]
        struct OpenAIRequest<'a> {
            model: &'a str,
            temperature: f32,
            messages: Vec<OpenAIMessage<'a>>,
            response_format: OpenAIResponseFormat,
        }

        #[derive(Serialize)]
        struct OpenAIMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct OpenAIResponseFormat {
            #[serde(rename = "type")]
            format_type: &'static str,
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            choices: Vec<OpenAIChoice>,
        }

        #[derive(Deserialize)]
        struct OpenAIChoice {
            message: OpenAIMessageResponse,
        }

        #[derive(Deserialize)]
        struct OpenAIMessageResponse {
            content: Option<String>,
        }

        let request = OpenAIRequest {
            model: &self.config.model,
            temperature: 0.0,
            messages: vec![OpenAIMessage {
                role: "user",
                content: prompt,
            }],
            response_format: OpenAIResponseFormat {
                format_type: "json_object",
            },
        };

        let url = format!("{}/chat/completions", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(map_send_error)?;

        let response = check_status(response).await?;

        let body: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| TransformError::Parse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| TransformError::Parse("No choices in response".to_string()))
    }

    /// Make Anthropic API request.
    async fn make_anthropic_request(&self, prompt: &str) -> Result<String, TransformError> {
        #[derive(Serialize)]
        struct AnthropicRequest<'a> {
            model: &'a str,
            max_tokens: u32,
            temperature: f32,
            messages: Vec<AnthropicMessage<'a>>,
        }

        #[derive(Serialize)]
        struct AnthropicMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Deserialize)]
        struct AnthropicResponse {
            content: Vec<AnthropicContent>,
        }

        #[derive(Deserialize)]
        struct AnthropicContent {
            #[serde(default)]
            text: String,
        }

        let request = AnthropicRequest {
            model: &self.config.model,
            max_tokens: 2048,
            temperature: 0.0,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let url = format!("{}/messages", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.config.api_key.expose_secret())
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(map_send_error)?;

        let response = check_status(response).await?;

        let body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| TransformError::Parse(e.to_string()))?;

        body.content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| TransformError::Parse("No content in response".to_string()))
    }
}

fn map_send_error(e: reqwest::Error) -> TransformError {
    if e.is_timeout() {
        TransformError::Timeout
    } else {
        TransformError::Api(e.to_string())
    }
}

/// Map HTTP status to the retry taxonomy.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransformError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(TransformError::RateLimited);
    }

    let body = response.text().await.unwrap_or_default();
    let message = format!("HTTP {}: {}", status, body);
    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        Err(TransformError::Api(message))
    } else {
        Err(TransformError::Rejected(message))
    }
}

#[async_trait]
impl ItemTransformer for ApiExtractor {
    async fn transform(&self, item: &Item) -> Result<Vec<GraphDocument>, TransformError> {
        let prompt = build_extraction_prompt(item, &self.config.filter);
        let response = self.make_request(&prompt).await?;

        match parse_extraction(&response, item, &self.config.filter)? {
            Some(mut doc) => {
                doc.source
                    .metadata
                    .insert("ingested_at".to_string(), chrono::Utc::now().to_rfc3339());
                doc.source
                    .metadata
                    .insert("model".to_string(), self.config.model.clone());
                debug!(
                    index = item.index,
                    nodes = doc.nodes.len(),
                    relationships = doc.relationships.len(),
                    "Extracted graph"
                );
                Ok(vec![doc])
            }
            None => {
                debug!(index = item.index, "Extraction produced an empty graph");
                Ok(Vec::new())
            }
        }
    }

    fn name(&self) -> &str {
        match self.config.provider {
            ApiProvider::OpenAi => "openai",
            ApiProvider::Anthropic => "anthropic",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn graph_json() -> String {
        json!({
            "nodes": [
                {"id": "Charge", "type": "Talent"},
                {"id": "Rage", "type": "Resource"}
            ],
            "relationships": [
                {"source": {"id": "Charge", "type": "Talent"},
                 "target": {"id": "Rage", "type": "Resource"},
                 "type": "GENERATES"}
            ]
        })
        .to_string()
    }

    fn item() -> Item {
        Item::new(7, "Charge: Charge to an enemy, generating Rage.")
            .with_metadata("category", "Warrior")
    }

    fn openai_extractor(server: &MockServer) -> ApiExtractor {
        let config = ApiExtractorConfig::openai("test-key", "gpt-4o").with_base_url(server.uri());
        ApiExtractor::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_openai_extraction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": graph_json()}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let docs = openai_extractor(&server).transform(&item()).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].nodes.len(), 2);
        assert_eq!(docs[0].relationships[0].rel_type, "GENERATES");
        assert_eq!(docs[0].source.id, "Warrior#7");
        assert_eq!(docs[0].source.metadata["model"], "gpt-4o");
        assert!(docs[0].source.metadata.contains_key("ingested_at"));
    }

    #[tokio::test]
    async fn test_anthropic_extraction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": format!("```json\n{}\n```", graph_json())}]
            })))
            .mount(&server)
            .await;

        let config = ApiExtractorConfig::claude("test-key", "claude-3-5-haiku-latest")
            .with_base_url(server.uri());
        let extractor = ApiExtractor::new(config).unwrap();
        let docs = extractor.transform(&item()).await.unwrap();
        assert_eq!(docs[0].nodes.len(), 2);
        assert_eq!(extractor.name(), "anthropic");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let extractor = openai_extractor(&server);

        let err = extractor.transform(&item()).await.unwrap_err();
        assert!(matches!(err, TransformError::RateLimited));

        let err = extractor.transform(&item()).await.unwrap_err();
        assert!(matches!(err, TransformError::Api(ref m) if m.contains("overloaded")));
        assert!(err.is_retryable());

        let err = extractor.transform(&item()).await.unwrap_err();
        assert!(matches!(err, TransformError::Rejected(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_empty_graph_yields_no_units() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "{\"nodes\": [], \"relationships\": []}"}}]
            })))
            .mount(&server)
            .await;

        let docs = openai_extractor(&server).transform(&item()).await.unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_config_from_settings() {
        let settings = ExtractorSettings {
            provider: "anthropic".to_string(),
            model: "claude-3-5-sonnet-latest".to_string(),
            api_key: Some("k".to_string()),
            api_base_url: Some("http://localhost:8080/v1/".to_string()),
            timeout_secs: 5,
            allowed_nodes: vec!["Talent".to_string()],
            allowed_relationships: Vec::new(),
        };
        let config = ApiExtractorConfig::from_settings(&settings).unwrap();
        assert_eq!(config.provider, ApiProvider::Anthropic);
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.filter.allows_node("talent"));
        assert!(!config.filter.allows_node("Buff"));
    }

    #[test]
    fn test_openai_config() {
        let config = ApiExtractorConfig::openai("test-key", "gpt-4o-mini");
        assert!(config.base_url.contains("openai"));
        assert_eq!(config.model, "gpt-4o-mini");
    }
}
