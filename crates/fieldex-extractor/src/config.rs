//! Configuration for the Extractor

use serde::{Deserialize, Serialize};

/// Configuration for the Extractor
///
/// Every field has a default, so a TOML table may set only the values it
/// wants to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Window size of the chunker (characters)
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,

    /// How far back from a cut point to look for a paragraph or sentence break (characters)
    pub boundary_lookback: usize,

    /// Nearest chunks retrieved per question
    pub top_k: usize,

    /// Questions sent to the model per call
    pub batch_size: usize,

    /// Total context window of the model (tokens)
    pub context_window: usize,

    /// Tokens reserved for the model's answer and the prompt text
    pub safety_margin: usize,

    /// Sampling temperature for extraction calls
    pub temperature: f32,

    /// Output-token cap for extraction calls
    pub max_output_tokens: u32,

    /// Prefix of the per-run vector collection name
    pub collection_prefix: String,

    /// Optional subject area used to specialise the system prompt (e.g. "medical")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl ExtractorConfig {
    /// Token budget available for packed context
    pub fn context_token_limit(&self) -> usize {
        self.context_window.saturating_sub(self.safety_margin)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than 0".to_string());
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err("chunk_overlap must be smaller than chunk_size".to_string());
        }
        if self.top_k == 0 {
            return Err("top_k must be greater than 0".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be greater than 0".to_string());
        }
        if self.context_window == 0 {
            return Err("context_window must be greater than 0".to_string());
        }
        if self.safety_margin >= self.context_window {
            return Err("safety_margin must be smaller than context_window".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature {} out of range [0.0, 2.0]",
                self.temperature
            ));
        }
        if self.max_output_tokens == 0 {
            return Err("max_output_tokens must be greater than 0".to_string());
        }
        if self.collection_prefix.trim().is_empty() {
            return Err("collection_prefix must not be empty".to_string());
        }
        Ok(())
    }
}

impl Default for ExtractorConfig {
    /// Defaults sized for an 8k-context local model
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 300,
            boundary_lookback: 100,
            top_k: 4,
            batch_size: 5,
            context_window: 8192,
            safety_margin: 1500,
            temperature: 0.1,
            max_output_tokens: 2000,
            collection_prefix: "documents".to_string(),
            domain: None,
        }
    }
}

impl ExtractorConfig {
    /// Precise preset: fewer questions per call, smaller chunks
    pub fn precise() -> Self {
        Self {
            chunk_size: 1200,
            chunk_overlap: 200,
            batch_size: 3,
            temperature: 0.0,
            ..Self::default()
        }
    }

    /// Broad preset: for 16k-context models, more evidence per call
    pub fn broad() -> Self {
        Self {
            chunk_size: 3000,
            chunk_overlap: 400,
            top_k: 6,
            batch_size: 8,
            context_window: 16_384,
            safety_margin: 2500,
            max_output_tokens: 3000,
            ..Self::default()
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
