//! OpenAI-compatible Chat Provider
//!
//! Talks to any server exposing `/chat/completions` in the OpenAI format:
//! LM Studio, vLLM, llama.cpp server, or OpenAI itself.
//!
//! # Features
//!
//! - Blocking HTTP communication
//! - Configurable endpoint, model and API key
//! - Retry logic with exponential backoff
//! - Timeout handling
//!
//! # Examples
//!
//! ```no_run
//! use fieldex_llm::OpenAiProvider;
//!
//! let provider = OpenAiProvider::new("http://localhost:1234/v1", "qwen2.5-14b-instruct")
//!     .unwrap()
//!     .with_api_key("lm-studio")
//!     .unwrap();
//! ```

use crate::transport::{build_client, endpoint_url, post_json};
use crate::LlmError;
use fieldex_domain::{CompletionRequest, LlmProvider};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default endpoint (a local LM Studio server)
pub const DEFAULT_ENDPOINT: &str = "http://localhost:1234/v1";

/// Default timeout for completion requests (local models are slow)
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default number of attempts per request
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// OpenAI-compatible chat completion provider
pub struct OpenAiProvider {
    endpoint: String,
    model: String,
    api_key: String,
    timeout: Duration,
    client: Client,
    max_retries: u32,
}

/// Request body for the chat completions API
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Response from the chat completions API
#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl OpenAiProvider {
    /// Create a new provider
    ///
    /// # Parameters
    ///
    /// - `endpoint`: API base URL including the version segment (e.g., "http://localhost:1234/v1")
    /// - `model`: Model to use (e.g., "qwen2.5-14b-instruct")
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let timeout = Duration::from_secs(DEFAULT_TIMEOUT_SECS);
        Ok(Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: String::new(),
            timeout,
            client: build_client("", timeout)?,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Create a provider against the default local endpoint
    pub fn default_endpoint(model: impl Into<String>) -> Result<Self, LlmError> {
        Self::new(DEFAULT_ENDPOINT, model)
    }

    /// Set the bearer token sent with every request
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Result<Self, LlmError> {
        self.api_key = api_key.into();
        self.client = build_client(&self.api_key, self.timeout)?;
        Ok(self)
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, LlmError> {
        self.timeout = timeout;
        self.client = build_client(&self.api_key, self.timeout)?;
        Ok(self)
    }

    /// Set the maximum number of attempts per request
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// API base URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl LlmProvider for OpenAiProvider {
    type Error = LlmError;

    fn generate(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = endpoint_url(&self.endpoint, "chat/completions");
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };

        debug!("POST {} (model {})", url, self.model);
        let response: ChatCompletionResponse =
            post_json(&self.client, &url, &body, &self.model, self.max_retries)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("Completion has no content".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider =
            OpenAiProvider::new("http://localhost:1234/v1", "qwen2.5-14b-instruct").unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:1234/v1");
        assert_eq!(provider.model_name(), "qwen2.5-14b-instruct");
        assert_eq!(provider.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_provider_default_endpoint() {
        let provider = OpenAiProvider::default_endpoint("mistral").unwrap();
        assert_eq!(provider.endpoint(), DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_provider_builders() {
        let provider = OpenAiProvider::new("http://localhost:1234/v1", "m")
            .unwrap()
            .with_api_key("lm-studio")
            .unwrap()
            .with_timeout(Duration::from_secs(5))
            .unwrap()
            .with_max_retries(5);
        assert_eq!(provider.max_retries, 5);
        assert_eq!(provider.timeout, Duration::from_secs(5));
        assert_eq!(provider.api_key, "lm-studio");
    }

    #[test]
    fn test_request_body_shape() {
        let body = ChatCompletionRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "system",
                content: "be precise",
            }],
            temperature: 0.1,
            max_tokens: 2000,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["max_tokens"], 2000);
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"{\"fields\":[]}"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("{\"fields\":[]}")
        );
    }

    #[test]
    fn test_error_handling() {
        let provider = OpenAiProvider::new("http://127.0.0.1:9/v1", "m")
            .unwrap()
            .with_max_retries(1);
        let request = CompletionRequest {
            system: String::new(),
            user: "test".to_string(),
            temperature: 0.1,
            max_tokens: 10,
        };

        match provider.generate(&request) {
            Err(LlmError::Communication(_)) => {}
            other => panic!("Expected Communication error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    #[ignore] // Only run when a local server is available
    fn test_generate_integration() {
        let provider = OpenAiProvider::default_endpoint("qwen2.5-14b-instruct").unwrap();
        let request = CompletionRequest {
            system: "Answer with one word.".to_string(),
            user: "Say hello".to_string(),
            temperature: 0.1,
            max_tokens: 10,
        };
        let response = provider.generate(&request).unwrap();
        assert!(!response.is_empty());
    }
}
