//! Provider seam for multimodal LLM calls.
//!
//! The engine talks to the model through the [`LlmClient`] trait so the
//! concrete provider stays swappable and tests run against mocks. The
//! shipped implementation is the Gemini client in [`gemini`].

pub mod gate;
pub mod gemini;
pub mod retry;

pub use gate::LlmGate;
pub use gemini::GeminiClient;
pub use retry::{with_retry, RetryPolicy};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Error taxonomy shared by every provider call.
///
/// Only `Transient`, `Timeout`, retriable `ProviderFault` statuses, and
/// `SchemaFault` are retried; `InvalidInput` propagates immediately.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("transient provider failure: {0}")]
    Transient(String),

    #[error("provider fault (status {status}): {message}")]
    ProviderFault { status: u16, message: String },

    #[error("provider call timed out after {0}s")]
    Timeout(u64),

    /// The model answered, but the structured response did not match the
    /// expected shape. Logged distinctly so prompt/model drift can be told
    /// apart from transport problems.
    #[error("malformed structured response: {0}")]
    SchemaFault(String),
}

impl LlmError {
    pub fn is_retriable(&self) -> bool {
        match self {
            LlmError::Transient(_) | LlmError::Timeout(_) => true,
            LlmError::ProviderFault { status, .. } => {
                *status == 429 || *status == 503 || *status >= 500
            }
            // The model may produce a conforming response on a fresh attempt.
            LlmError::SchemaFault(_) => true,
            LlmError::InvalidInput(_) => false,
        }
    }
}

/// A labeled PDF attached to a provider request. The label precedes the
/// binary part so the model can tell the documents apart.
#[derive(Debug, Clone)]
pub struct DocumentPart {
    pub label: String,
    pub content: Bytes,
}

impl DocumentPart {
    pub fn new(label: impl Into<String>, content: Bytes) -> Self {
        Self {
            label: label.into(),
            content,
        }
    }
}

/// One multimodal generation request. The response is expected to be a
/// single JSON document (`responseMimeType: application/json` on Gemini);
/// callers deserialize it into their own schema.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub documents: Vec<DocumentPart>,
    pub temperature: f32,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one generation request, returning the raw JSON text of the
    /// model's structured output.
    async fn generate(&self, request: GenerateRequest) -> Result<String, LlmError>;
}

/// Mock client for tests, returning a configurable canned response.
pub struct MockLlmClient {
    response: String,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(&self, _request: GenerateRequest) -> Result<String, LlmError> {
        Ok(self.response.clone())
    }
}
