//! Configuration management for the CLI.

use crate::cli::EndpointArgs;
use crate::error::{CliError, Result};
use fieldex_extractor::{DiagnosticsConfig, ExtractorConfig};
use fieldex_llm::embedder::DEFAULT_EMBEDDING_MODEL;
use fieldex_llm::openai::DEFAULT_ENDPOINT;
use fieldex_llm::scorer::DEFAULT_RERANK_MODEL;
use fieldex_llm::RerankApi;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default chat model.
pub const DEFAULT_MODEL: &str = "qwen2.5-14b-instruct";

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Input and output files
    #[serde(default)]
    pub paths: Paths,

    /// Chat model server
    #[serde(default)]
    pub llm: LlmSettings,

    /// Embedding server
    #[serde(default)]
    pub embedding: EmbeddingSettings,

    /// Relevance scorer
    #[serde(default)]
    pub reranker: RerankerSettings,

    /// Pipeline tuning
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Retrieval probe, off unless a term is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<DiagnosticsConfig>,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,
}

/// Default file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// Plain-text document
    pub context: PathBuf,

    /// Question schema
    pub schema: PathBuf,

    /// Results file
    pub output: PathBuf,
}

/// Chat model connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// OpenAI-compatible base URL
    pub endpoint: String,

    /// Bearer token, if the server wants one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Embedding model connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Base URL; the chat endpoint is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Bearer token; the chat key is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Which relevance scorer to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RerankerKind {
    /// Cross-encoder behind a `/rerank` endpoint
    Http,
    /// Offline term overlap
    TermOverlap,
}

/// Relevance scorer connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerSettings {
    /// Scorer implementation
    pub kind: RerankerKind,

    /// Wire format of the rerank endpoint
    pub api: RerankApi,

    /// Server root, `/rerank` is appended
    pub endpoint: String,

    /// Cross-encoder model name
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Global CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
    /// Quiet (minimal) format
    Quiet,
}

impl Config {
    /// Get the default configuration file path.
    pub fn path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".fieldex").join("config.toml"))
    }

    /// Load configuration from `path`, or the default location.
    ///
    /// A missing file at the default location yields the defaults; a missing
    /// file that was asked for explicitly is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::path()?, false),
        };

        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            Self::from_toml(&contents)
        } else if explicit {
            Err(CliError::Config(format!("{} not found", path.display())))
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.extractor.validate().map_err(CliError::Config)?;
        Ok(config)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Save configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Apply endpoint flags on top of file values.
    pub fn apply_endpoint(&mut self, args: &EndpointArgs) {
        if let Some(endpoint) = &args.endpoint {
            self.llm.endpoint = endpoint.clone();
        }
        if let Some(model) = &args.model {
            self.llm.model = model.clone();
        }
        if let Some(api_key) = &args.api_key {
            self.llm.api_key = Some(api_key.clone());
        }
    }

    /// Base URL for embeddings.
    pub fn embedding_endpoint(&self) -> &str {
        self.embedding.endpoint.as_deref().unwrap_or(&self.llm.endpoint)
    }

    /// API key for embeddings.
    pub fn embedding_api_key(&self) -> &str {
        self.embedding
            .api_key
            .as_deref()
            .or(self.llm.api_key.as_deref())
            .unwrap_or("")
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            context: PathBuf::from("context.txt"),
            schema: PathBuf::from("schema.json"),
            output: PathBuf::from("extraction_results.json"),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: fieldex_llm::openai::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            timeout_secs: fieldex_llm::embedder::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for RerankerSettings {
    fn default() -> Self {
        Self {
            kind: RerankerKind::Http,
            api: RerankApi::default(),
            endpoint: "http://localhost:8787".to_string(),
            model: DEFAULT_RERANK_MODEL.to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.endpoint, "http://localhost:1234/v1");
        assert_eq!(config.llm.model, "qwen2.5-14b-instruct");
        assert_eq!(config.embedding.model, "text-embedding-nomic-embed-text-v1.5");
        assert_eq!(config.reranker.kind, RerankerKind::Http);
        assert_eq!(config.reranker.model, "cross-encoder/ms-marco-MiniLM-L-6-v2");
        assert_eq!(config.reranker.api, RerankApi::Standard);
        assert_eq!(config.extractor, ExtractorConfig::default());
        assert!(config.diagnostics.is_none());
        assert!(config.settings.color);
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
[llm]
model = "llama-3-8b"

[reranker]
kind = "term-overlap"
api = "tei"

[extractor]
batch_size = 3

[diagnostics]
term = "Metformin"
watch_field = "medications"
"#,
        )
        .unwrap();

        assert_eq!(config.llm.model, "llama-3-8b");
        assert_eq!(config.llm.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.reranker.kind, RerankerKind::TermOverlap);
        assert_eq!(config.reranker.api, RerankApi::Tei);
        assert_eq!(config.extractor.batch_size, 3);
        assert_eq!(config.extractor.top_k, 4);

        let diagnostics = config.diagnostics.unwrap();
        assert_eq!(diagnostics.term, "Metformin");
        assert_eq!(diagnostics.watch_field.as_deref(), Some("medications"));
        assert!(diagnostics.question.is_none());
    }

    #[test]
    fn test_invalid_extractor_section() {
        let result = Config::from_toml("[extractor]\nbatch_size = 0\n");
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_endpoint_overrides() {
        let mut config = Config::default();
        config.apply_endpoint(&EndpointArgs {
            endpoint: Some("http://gpu-box:8000/v1".to_string()),
            model: None,
            api_key: Some("secret".to_string()),
        });

        assert_eq!(config.llm.endpoint, "http://gpu-box:8000/v1");
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert_eq!(config.embedding_endpoint(), "http://gpu-box:8000/v1");
        assert_eq!(config.embedding_api_key(), "secret");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.extractor.top_k = 7;
        config.settings.format = OutputFormat::Json;
        config.save(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.extractor.top_k, 7);
        assert_eq!(loaded.settings.format, OutputFormat::Json);
    }

    #[test]
    fn test_explicit_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(CliError::Config(_))));
    }
}
