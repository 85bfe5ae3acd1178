//! Neo4j sink over the HTTP transaction API.
//!
//! Each commit is one `POST {url}/db/{database}/tx/commit` carrying all
//! statements for the documents, so Neo4j applies them in a single
//! transaction or not at all.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use kg_ingest::{GraphSink, SinkError};
use kg_types::{GraphDocument, GraphSettings};

use crate::cypher::{statements_for, Statement};

/// Connection settings for Neo4j.
#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    /// HTTP endpoint (e.g., "http://localhost:7474")
    pub url: String,
    pub user: String,
    pub password: Option<SecretString>,
    pub database: String,
    pub timeout: Duration,
}

impl Neo4jConfig {
    pub fn new(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            user: "neo4j".to_string(),
            password: None,
            database: database.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.user = user.into();
        self.password = Some(SecretString::from(password.into()));
        self
    }

    pub fn from_settings(settings: &GraphSettings) -> Self {
        let config = Self::new(settings.neo4j_url.clone(), settings.database.clone());
        match &settings.neo4j_password {
            Some(password) => {
                config.with_credentials(settings.neo4j_user.clone(), password.clone())
            }
            None => Self {
                user: settings.neo4j_user.clone(),
                ..config
            },
        }
    }

    fn commit_url(&self) -> String {
        format!("{}/db/{}/tx/commit", self.url, self.database)
    }
}

#[derive(Serialize)]
struct CommitRequest<'a> {
    statements: &'a [Statement],
}

#[derive(Deserialize)]
struct CommitResponse {
    #[serde(default)]
    errors: Vec<Neo4jError>,
}

#[derive(Deserialize)]
struct Neo4jError {
    code: String,
    message: String,
}

/// Graph sink writing to Neo4j.
///
/// Construct with [`Neo4jHttpSink::connect`], which verifies the server
/// is reachable. After [`GraphSink::close`] every commit fails with
/// [`SinkError::Closed`].
pub struct Neo4jHttpSink {
    client: Client,
    config: Neo4jConfig,
    closed: AtomicBool,
}

impl Neo4jHttpSink {
    /// Connect and check that the server answers.
    pub async fn connect(config: Neo4jConfig) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SinkError::Connection(e.to_string()))?;

        let sink = Self {
            client,
            config,
            closed: AtomicBool::new(false),
        };

        let response = sink
            .authorized(sink.client.get(format!("{}/", sink.config.url)))
            .send()
            .await
            .map_err(|e| SinkError::Connection(e.to_string()))?;
        if !response.status().is_success() {
            return Err(SinkError::Connection(format!(
                "Neo4j at {} answered HTTP {}",
                sink.config.url,
                response.status()
            )));
        }

        info!(url = %sink.config.url, database = %sink.config.database, "Connected to Neo4j");
        Ok(sink)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.password {
            Some(password) => {
                request.basic_auth(&self.config.user, Some(password.expose_secret()))
            }
            None => request,
        }
    }
}

#[async_trait]
impl GraphSink for Neo4jHttpSink {
    async fn commit(
        &self,
        units: &[GraphDocument],
        include_source: bool,
    ) -> Result<(), SinkError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SinkError::Closed);
        }

        let statements = statements_for(units, include_source);
        if statements.is_empty() {
            return Ok(());
        }

        let response = self
            .authorized(self.client.post(self.config.commit_url()))
            .json(&CommitRequest {
                statements: &statements,
            })
            .send()
            .await
            .map_err(|e| SinkError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let code = format!("HTTP {}", status.as_u16());
            return Err(
                if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                    SinkError::Transient { code, message: body }
                } else {
                    SinkError::Query { code, message: body }
                },
            );
        }

        let body: CommitResponse = response
            .json()
            .await
            .map_err(|e| SinkError::Serialization(e.to_string()))?;

        if let Some(error) = body.errors.into_iter().next() {
            return Err(if error.code.starts_with("Neo.TransientError") {
                SinkError::Transient {
                    code: error.code,
                    message: error.message,
                }
            } else {
                SinkError::Query {
                    code: error.code,
                    message: error.message,
                }
            });
        }

        debug!(
            documents = units.len(),
            statements = statements.len(),
            "Committed graph documents to Neo4j"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(url = %self.config.url, "Closed Neo4j sink");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "neo4j"
    }
}
