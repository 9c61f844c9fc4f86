//! Generation-provider seam: the trait the pipeline consumes, its error
//! classification, and the resilient client wrapped around it.
//!
//! The pipeline never talks to a provider directly; it goes through
//! [`GenerationClient`], which owns the retry budget, per-call timeout,
//! backoff, and structured-output extraction. Concrete adapters (the
//! Anthropic Messages API in [`anthropic`], fakes in tests) only have to
//! implement one honest request/response call.

pub mod anthropic;
pub mod client;
pub mod retry;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use client::{GenerationClient, RetryPolicy, extract_json_object};

use async_trait::async_trait;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One completion request to the generation provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// User-role prompt content.
    pub prompt: String,
    /// Optional system instruction (role definition).
    pub system: Option<String>,
    /// Sampling temperature; low keeps planning output deterministic.
    pub temperature: f32,
    /// Output size bound in tokens.
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Default sampling temperature.
    pub const DEFAULT_TEMPERATURE: f32 = 0.2;
    /// Default output bound, sized for long JSON plans.
    pub const DEFAULT_MAX_TOKENS: u32 = 8192;

    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            temperature: Self::DEFAULT_TEMPERATURE,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the generation provider and its client wrapper.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rate-limited the request.
    #[error("provider rate-limited the request")]
    RateLimited,

    /// The request never reached the provider or the connection dropped.
    #[error("connection to provider failed: {0}")]
    Connection(String),

    /// The call exceeded its per-request time budget.
    #[error("provider request timed out")]
    Timeout,

    /// The provider answered with a non-retryable error.
    #[error("provider error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Transient failures persisted through the whole retry budget.
    #[error("provider retries exhausted after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<ProviderError>,
    },

    /// The provider's output could not be parsed as the required structure
    /// after exhausting the retry budget.
    #[error("provider output was not valid structured data after {attempts} attempts")]
    InvalidOutput { attempts: u32 },
}

impl ProviderError {
    /// Transient failures are absorbed by the retry loop; everything else
    /// propagates immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited | ProviderError::Connection(_) | ProviderError::Timeout
        )
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// An external text-generation capability.
///
/// Implementations perform exactly one attempt per call; retry, backoff and
/// timeouts belong to [`GenerationClient`].
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Short adapter name for logs.
    fn name(&self) -> &str;

    /// Send one completion request and return the generated text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}
