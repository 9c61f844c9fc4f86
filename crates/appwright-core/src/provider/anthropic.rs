//! Anthropic Messages API provider adapter.
//!
//! Non-streaming: one POST per completion, text extracted from the first
//! `text` content block of the response. Rate-limit and overload statuses
//! map to transient errors so [`super::GenerationClient`] can absorb them;
//! every other API error is fatal and propagates as-is.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Value, json};
use tracing::debug;

use super::{CompletionRequest, GenerationProvider, ProviderError};

/// Messages API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default model for plan and code generation.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Configuration for the Anthropic adapter.
#[derive(Clone)]
pub struct AnthropicConfig {
    /// API key, sent as `x-api-key`.
    pub api_key: String,
    /// Model name.
    pub model: String,
    /// Endpoint override (tests, proxies).
    pub base_url: String,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl std::fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Provider adapter for the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Use a pre-built HTTP client (connection pooling, proxies).
    pub fn with_client(client: reqwest::Client, config: AnthropicConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl GenerationProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let mut body = json!({
            "model": self.config.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [{"role": "user", "content": request.prompt}],
        });
        if let Some(system) = &request.system {
            body["system"] = json!(system);
        }

        debug!(model = %self.config.model, "sending messages request");

        let response = self
            .client
            .post(&self.config.base_url)
            .header(CONTENT_TYPE, "application/json")
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body_text = response.text().await.unwrap_or_default();
            return Err(classify_error_status(status, &body_text));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        if let Some(output_tokens) = value["usage"]["output_tokens"].as_u64() {
            debug!(output_tokens, "messages response received");
        }

        Ok(extract_text(&value))
    }
}

/// Map a reqwest transport error to the transient classification.
fn classify_request_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Connection(e.to_string())
    }
}

/// Map a non-success HTTP status to a provider error.
///
/// 429 (rate limit) and 529 (overloaded) are transient; everything else is
/// fatal, with the message pulled from the API error envelope when present.
fn classify_error_status(status: u16, body: &str) -> ProviderError {
    if status == 429 || status == 529 {
        return ProviderError::RateLimited;
    }

    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string());

    ProviderError::Api { status, message }
}

/// Pull the first `text` content block out of a messages response.
fn extract_text(response: &Value) -> String {
    response["content"]
        .as_array()
        .and_then(|blocks| {
            blocks
                .iter()
                .find(|b| b["type"].as_str() == Some("text"))
                .and_then(|b| b["text"].as_str())
        })
        .unwrap_or_default()
        .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_overload_are_transient() {
        assert!(classify_error_status(429, "").is_transient());
        assert!(classify_error_status(529, "").is_transient());
    }

    #[test]
    fn other_statuses_are_fatal_with_envelope_message() {
        let body = r#"{"error": {"type": "invalid_request_error", "message": "prompt too long"}}"#;
        match classify_error_status(400, body) {
            ProviderError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "prompt too long");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn unparseable_error_body_falls_back_to_raw_text() {
        match classify_error_status(500, "upstream blew up") {
            ProviderError::Api { message, .. } => assert_eq!(message, "upstream blew up"),
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn extracts_first_text_block() {
        let response = serde_json::json!({
            "content": [
                {"type": "tool_use", "name": "x"},
                {"type": "text", "text": "generated output"},
                {"type": "text", "text": "second block"},
            ]
        });
        assert_eq!(extract_text(&response), "generated output");
    }

    #[test]
    fn empty_content_yields_empty_string() {
        assert_eq!(extract_text(&serde_json::json!({"content": []})), "");
        assert_eq!(extract_text(&serde_json::json!({})), "");
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AnthropicConfig::new("sk-secret-value");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret-value"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn config_builders() {
        let config = AnthropicConfig::new("k")
            .with_model("claude-opus-4-1")
            .with_base_url("http://localhost:9999/v1/messages");
        assert_eq!(config.model, "claude-opus-4-1");
        assert_eq!(config.base_url, "http://localhost:9999/v1/messages");
    }
}
