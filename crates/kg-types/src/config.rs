//! Configuration loading for the knowledge-graph builder.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at `~/.config/kg-builder/config.toml`.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::KgError;

/// How the wait between attempts evolves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DelayStrategyKind {
    /// Same delay before every retry
    #[default]
    Fixed,
    /// Delay grows after each failed attempt, capped at `max_delay_ms`
    Exponential,
}

/// Retry settings applied to every item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts per item, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before a retry (ms). Initial delay for the exponential strategy.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    #[serde(default)]
    pub strategy: DelayStrategyKind,

    /// Upper bound for exponential delays (ms)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    2000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            strategy: DelayStrategyKind::default(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Extraction model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorSettings {
    /// Provider name ("openai", "anthropic", "passthrough")
    #[serde(default = "default_extractor_provider")]
    pub provider: String,

    /// Model name (e.g., "gpt-4o")
    #[serde(default = "default_extractor_model")]
    pub model: String,

    /// API key (usually from KG_EXTRACTOR__API_KEY, not the config file)
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    #[serde(default)]
    pub api_base_url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Node types the extractor may emit. Empty means unrestricted.
    #[serde(default)]
    pub allowed_nodes: Vec<String>,

    /// Relationship types the extractor may emit. Empty means unrestricted.
    #[serde(default)]
    pub allowed_relationships: Vec<String>,
}

fn default_extractor_provider() -> String {
    "openai".to_string()
}

fn default_extractor_model() -> String {
    "gpt-4o".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            provider: default_extractor_provider(),
            model: default_extractor_model(),
            api_key: None,
            api_base_url: None,
            timeout_secs: default_timeout_secs(),
            allowed_nodes: Vec::new(),
            allowed_relationships: Vec::new(),
        }
    }
}

/// Where graph documents are committed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GraphBackend {
    /// Append-only JSON lines file
    #[default]
    Jsonl,
    /// Neo4j over its HTTP transaction API
    Neo4j,
}

/// Graph store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSettings {
    #[serde(default)]
    pub backend: GraphBackend,

    /// Output file for the jsonl backend
    #[serde(default = "default_jsonl_path")]
    pub jsonl_path: String,

    #[serde(default = "default_neo4j_url")]
    pub neo4j_url: String,

    #[serde(default = "default_neo4j_user")]
    pub neo4j_user: String,

    #[serde(default)]
    pub neo4j_password: Option<String>,

    #[serde(default = "default_database")]
    pub database: String,

    /// Attach the source passage to committed documents
    #[serde(default = "default_include_source")]
    pub include_source: bool,
}

fn default_jsonl_path() -> String {
    ProjectDirs::from("", "", "kg-builder")
        .map(|p| p.data_local_dir().join("graph.jsonl"))
        .unwrap_or_else(|| PathBuf::from("./graph.jsonl"))
        .to_string_lossy()
        .to_string()
}

fn default_neo4j_url() -> String {
    "http://localhost:7474".to_string()
}

fn default_neo4j_user() -> String {
    "neo4j".to_string()
}

fn default_database() -> String {
    "neo4j".to_string()
}

fn default_include_source() -> bool {
    true
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            backend: GraphBackend::default(),
            jsonl_path: default_jsonl_path(),
            neo4j_url: default_neo4j_url(),
            neo4j_user: default_neo4j_user(),
            neo4j_password: None,
            database: default_database(),
            include_source: default_include_source(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory for checkpoint files. Defaults to the input file's directory.
    #[serde(default)]
    pub checkpoint_dir: Option<String>,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub extractor: ExtractorSettings,

    #[serde(default)]
    pub graph: GraphSettings,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            checkpoint_dir: None,
            retry: RetrySettings::default(),
            extractor: ExtractorSettings::default(),
            graph: GraphSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/kg-builder/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (KG_*, `__` between nested keys)
    ///
    /// CLI flags should be applied by the caller after this returns,
    /// followed by [`Settings::validate`].
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, KgError> {
        let config_dir = ProjectDirs::from("", "", "kg-builder")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("log_level", default_log_level())
            .map_err(|e| KgError::Config(e.to_string()))?
            .set_default("retry.max_attempts", default_max_attempts() as i64)
            .map_err(|e| KgError::Config(e.to_string()))?
            .set_default("retry.delay_ms", default_delay_ms() as i64)
            .map_err(|e| KgError::Config(e.to_string()))?
            .set_default("extractor.provider", default_extractor_provider())
            .map_err(|e| KgError::Config(e.to_string()))?
            .set_default("extractor.model", default_extractor_model())
            .map_err(|e| KgError::Config(e.to_string()))?
            .set_default("graph.jsonl_path", default_jsonl_path())
            .map_err(|e| KgError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // KG_LOG_LEVEL, KG_RETRY__MAX_ATTEMPTS, KG_GRAPH__NEO4J_PASSWORD, ...
        builder = builder.add_source(
            Environment::with_prefix("KG")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| KgError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| KgError::Config(e.to_string()))?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), KgError> {
        if self.retry.max_attempts == 0 {
            return Err(KgError::Config("retry.max_attempts must be > 0".to_string()));
        }
        if self.retry.strategy == DelayStrategyKind::Exponential
            && self.retry.max_delay_ms < self.retry.delay_ms
        {
            return Err(KgError::Config(format!(
                "retry.max_delay_ms ({}) must be >= retry.delay_ms ({})",
                self.retry.max_delay_ms, self.retry.delay_ms
            )));
        }
        match self.extractor.provider.as_str() {
            "openai" | "anthropic" | "passthrough" => {}
            other => {
                return Err(KgError::Config(format!(
                    "unknown extractor.provider '{}'",
                    other
                )))
            }
        }
        if self.extractor.timeout_secs == 0 {
            return Err(KgError::Config("extractor.timeout_secs must be > 0".to_string()));
        }
        Ok(())
    }

    /// Checkpoint directory with `~` expanded.
    pub fn expanded_checkpoint_dir(&self) -> Option<PathBuf> {
        self.checkpoint_dir.as_deref().map(expand_home)
    }

    /// Graph output path with `~` expanded.
    pub fn expanded_jsonl_path(&self) -> PathBuf {
        expand_home(&self.graph.jsonl_path)
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    Path::new(path).to_path_buf()
}
