//! Fieldex Model Provider Layer
//!
//! Implementations of the collaborator traits from `fieldex-domain` that talk
//! to model servers, plus deterministic doubles for testing.
//!
//! # Providers
//!
//! - [`MockProvider`]: Deterministic chat mock for testing
//! - [`OpenAiProvider`]: OpenAI-compatible `/chat/completions` (LM Studio, vLLM, OpenAI)
//! - [`OpenAiEmbedder`]: OpenAI-compatible `/embeddings`
//! - [`HttpScorer`]: Cross-encoder served behind a `/rerank` endpoint
//! - [`TermOverlapScorer`]: Offline relevance scoring by query term overlap
//!
//! All HTTP adapters are blocking: the extraction pipeline is sequential and
//! waits on every external call.
//!
//! # Examples
//!
//! ```
//! use fieldex_domain::{CompletionRequest, LlmProvider};
//! use fieldex_llm::MockProvider;
//!
//! let provider = MockProvider::new(r#"{"fields": []}"#);
//! let request = CompletionRequest {
//!     system: "system".to_string(),
//!     user: "user".to_string(),
//!     temperature: 0.1,
//!     max_tokens: 2000,
//! };
//! assert_eq!(provider.generate(&request).unwrap(), r#"{"fields": []}"#);
//! ```

#![warn(missing_docs)]

pub mod embedder;
pub mod openai;
pub mod scorer;
mod transport;

use fieldex_domain::{CompletionRequest, LlmProvider};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

pub use embedder::OpenAiEmbedder;
pub use openai::OpenAiProvider;
pub use scorer::{HttpScorer, RerankApi, TermOverlapScorer};

/// Errors that can occur during model operations
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from the server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

type Responder = dyn Fn(&CompletionRequest) -> Result<String, String> + Send + Sync;

/// Mock LLM provider for deterministic testing
///
/// This provider returns pre-configured responses without making any network
/// calls. Queued responses (or errors) are served first, in order; once the
/// queue is empty the provider falls back to its responder, or to the fixed
/// default response.
///
/// # Examples
///
/// ```
/// use fieldex_domain::{CompletionRequest, LlmProvider};
/// use fieldex_llm::MockProvider;
///
/// let request = CompletionRequest {
///     system: String::new(),
///     user: String::new(),
///     temperature: 0.1,
///     max_tokens: 100,
/// };
///
/// let provider = MockProvider::new("fallback");
/// provider.push_response("first");
/// provider.push_error("connection reset");
///
/// assert_eq!(provider.generate(&request).unwrap(), "first");
/// assert!(provider.generate(&request).is_err());
/// assert_eq!(provider.generate(&request).unwrap(), "fallback");
/// assert_eq!(provider.call_count(), 3);
/// ```
#[derive(Clone)]
pub struct MockProvider {
    default_response: String,
    responder: Option<Arc<Responder>>,
    queue: Arc<Mutex<VecDeque<Result<String, String>>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    model: String,
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all requests
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            responder: None,
            queue: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            model: "mock".to_string(),
        }
    }

    /// Create a MockProvider that computes each answer from the request
    ///
    /// Returning `Err(message)` makes the call fail with [`LlmError::Other`].
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, String> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Arc::new(responder)),
            ..Self::default()
        }
    }

    /// Set the reported model name
    pub fn with_model_name(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Queue a response for the next unanswered request
    pub fn push_response(&self, response: impl Into<String>) {
        lock(&self.queue).push_back(Ok(response.into()));
    }

    /// Queue an error for the next unanswered request
    pub fn push_error(&self, message: impl Into<String>) {
        lock(&self.queue).push_back(Err(message.into()));
    }

    /// Get the number of times generate was called
    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    /// Forget recorded requests
    pub fn reset_call_count(&self) {
        lock(&self.requests).clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

impl fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockProvider")
            .field("default_response", &self.default_response)
            .field("has_responder", &self.responder.is_some())
            .field("model", &self.model)
            .finish()
    }
}

impl LlmProvider for MockProvider {
    type Error = LlmError;

    fn generate(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        lock(&self.requests).push(request.clone());

        if let Some(queued) = lock(&self.queue).pop_front() {
            return queued.map_err(LlmError::Other);
        }

        match &self.responder {
            Some(responder) => responder(request).map_err(LlmError::Other),
            None => Ok(self.default_response.clone()),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
