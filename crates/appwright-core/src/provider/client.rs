//! Resilient client over a [`GenerationProvider`].
//!
//! `generate_text` owns the transient-failure retry loop (exponential
//! backoff, per-call timeout); `generate_structured` adds brace-scan JSON
//! extraction with its own short-delay retry. Both lean on
//! [`retry::retry`], differing only in classifier and backoff policy.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use super::retry::{self, BackoffPolicy, RetryError};
use super::{CompletionRequest, GenerationProvider, ProviderError};

/// Retry and timeout budget for provider calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per call before giving up.
    pub max_attempts: u32,
    /// Per-attempt wall-clock bound; an elapsed timeout counts as transient.
    pub request_timeout: Duration,
    /// Base for the `base * 2^attempt` transient backoff.
    pub backoff_base: Duration,
    /// Fixed delay between structured-output parse retries.
    pub structured_retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            request_timeout: Duration::from_secs(120),
            backoff_base: Duration::from_secs(1),
            structured_retry_delay: Duration::from_secs(1),
        }
    }
}

/// Generation client with retry, backoff, and structured-output extraction.
#[derive(Debug, Clone)]
pub struct GenerationClient<P> {
    provider: P,
    policy: RetryPolicy,
}

/// One structured-output attempt can fail in the provider or in parsing;
/// only parse failures are worth re-asking the provider about.
#[derive(Debug)]
enum StructuredAttemptError {
    Provider(ProviderError),
    Unparseable(String),
}

impl<P: GenerationProvider> GenerationClient<P> {
    pub fn new(provider: P) -> Self {
        Self::with_policy(provider, RetryPolicy::default())
    }

    pub fn with_policy(provider: P, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Generate raw text.
    ///
    /// Transient failures (rate limit, connection, timeout) back off
    /// `2^attempt` seconds and retry up to the budget; non-transient
    /// provider errors propagate immediately; an exhausted budget becomes
    /// [`ProviderError::RetriesExhausted`].
    pub async fn generate_text(
        &self,
        request: &CompletionRequest,
    ) -> Result<String, ProviderError> {
        let policy = self.policy;
        let provider = &self.provider;

        let result = retry::retry(
            policy.max_attempts,
            BackoffPolicy::Exponential {
                base: policy.backoff_base,
            },
            ProviderError::is_transient,
            |attempt| async move {
                debug!(attempt, provider = provider.name(), "sending generation request");
                match tokio::time::timeout(policy.request_timeout, provider.complete(request))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout),
                }
            },
        )
        .await;

        result.map_err(|e| match e {
            RetryError::Fatal(err) => err,
            RetryError::Exhausted { attempts, last } => ProviderError::RetriesExhausted {
                attempts,
                last: Box::new(last),
            },
        })
    }

    /// Generate a structured object.
    ///
    /// Calls [`Self::generate_text`], extracts the substring from the first
    /// `{` to the last `}` (tolerating prose or formatting the provider
    /// wraps around the payload), and parses it as JSON. Missing braces or
    /// a parse failure retry the whole call after a fixed short delay, up
    /// to the budget, then fail with [`ProviderError::InvalidOutput`].
    pub async fn generate_structured(
        &self,
        request: &CompletionRequest,
    ) -> Result<Value, ProviderError> {
        let result = retry::retry(
            self.policy.max_attempts,
            BackoffPolicy::Fixed(self.policy.structured_retry_delay),
            |e| matches!(e, StructuredAttemptError::Unparseable(_)),
            |attempt| async move {
                let text = self
                    .generate_text(request)
                    .await
                    .map_err(StructuredAttemptError::Provider)?;

                let json = extract_json_object(&text).ok_or_else(|| {
                    debug!(attempt, "no JSON object delimiters in provider output");
                    StructuredAttemptError::Unparseable(
                        "no JSON object delimiters in output".to_string(),
                    )
                })?;

                serde_json::from_str(json).map_err(|e| {
                    debug!(attempt, error = %e, "provider output failed to parse as JSON");
                    StructuredAttemptError::Unparseable(e.to_string())
                })
            },
        )
        .await;

        result.map_err(|e| match e {
            RetryError::Fatal(StructuredAttemptError::Provider(err)) => err,
            RetryError::Fatal(StructuredAttemptError::Unparseable(_))
            | RetryError::Exhausted { .. } => ProviderError::InvalidOutput {
                attempts: self.policy.max_attempts,
            },
        })
    }
}

/// Extract the substring spanning the first `{` through the last `}`.
///
/// Returns `None` when either brace is missing or they are inverted.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    /// Provider that replays a fixed queue of outcomes.
    struct ScriptedProvider {
        responses: Mutex<VecDeque<Result<String, ProviderError>>>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(ProviderError::Api {
                        status: 500,
                        message: "script exhausted".to_string(),
                    })
                })
        }
    }

    /// Provider that never answers within a short timeout.
    struct StalledProvider;

    #[async_trait]
    impl GenerationProvider for StalledProvider {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(String::new())
        }
    }

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            request_timeout: Duration::from_secs(5),
            backoff_base: Duration::from_millis(1),
            structured_retry_delay: Duration::from_millis(1),
        }
    }

    fn client(responses: Vec<Result<String, ProviderError>>) -> GenerationClient<ScriptedProvider> {
        GenerationClient::with_policy(ScriptedProvider::new(responses), quick_policy())
    }

    // -- generate_text ------------------------------------------------------

    #[tokio::test]
    async fn text_returns_on_first_success() {
        let client = client(vec![Ok("hello".to_string())]);
        assert_eq!(client.generate_text(&CompletionRequest::new("p")).await.unwrap(), "hello");
        assert_eq!(client.provider().calls(), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_to_success() {
        let client = client(vec![
            Err(ProviderError::RateLimited),
            Err(ProviderError::Connection("reset".to_string())),
            Ok("eventually".to_string()),
        ]);
        assert_eq!(
            client.generate_text(&CompletionRequest::new("p")).await.unwrap(),
            "eventually"
        );
        assert_eq!(client.provider().calls(), 3);
    }

    #[tokio::test]
    async fn fatal_provider_error_propagates_without_retry() {
        let client = client(vec![Err(ProviderError::Api {
            status: 400,
            message: "bad prompt".to_string(),
        })]);
        let err = client
            .generate_text(&CompletionRequest::new("p"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 400, .. }));
        assert_eq!(client.provider().calls(), 1);
    }

    #[tokio::test]
    async fn exhausted_budget_reports_retries_exhausted() {
        let client = client(vec![
            Err(ProviderError::RateLimited),
            Err(ProviderError::RateLimited),
            Err(ProviderError::Timeout),
        ]);
        let err = client
            .generate_text(&CompletionRequest::new("p"))
            .await
            .unwrap_err();
        match err {
            ProviderError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, ProviderError::Timeout));
            }
            other => panic!("expected retries exhausted, got {other:?}"),
        }
        assert_eq!(client.provider().calls(), 3);
    }

    #[tokio::test]
    async fn per_call_timeout_is_classified_transient() {
        let policy = RetryPolicy {
            max_attempts: 2,
            request_timeout: Duration::from_millis(5),
            backoff_base: Duration::from_millis(1),
            structured_retry_delay: Duration::from_millis(1),
        };
        let client = GenerationClient::with_policy(StalledProvider, policy);
        let err = client
            .generate_text(&CompletionRequest::new("p"))
            .await
            .unwrap_err();
        match err {
            ProviderError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, ProviderError::Timeout));
            }
            other => panic!("expected exhausted timeouts, got {other:?}"),
        }
    }

    // -- generate_structured ------------------------------------------------

    #[tokio::test]
    async fn structured_tolerates_prose_around_payload() {
        let client = client(vec![Ok(
            "Sure! Here is the plan:\n```json\n{\"stack\": {}}\n```\nHope that helps.".to_string(),
        )]);
        let value = client
            .generate_structured(&CompletionRequest::new("p"))
            .await
            .unwrap();
        assert_eq!(value, serde_json::json!({"stack": {}}));
    }

    #[tokio::test]
    async fn structured_retries_parse_failures_then_succeeds() {
        let client = client(vec![
            Ok("no braces at all".to_string()),
            Ok("{not json".to_string()),
            Ok("{\"ok\": true}".to_string()),
        ]);
        let value = client
            .generate_structured(&CompletionRequest::new("p"))
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(client.provider().calls(), 3);
    }

    #[tokio::test]
    async fn structured_gives_up_with_invalid_output() {
        let client = client(vec![
            Ok("prose".to_string()),
            Ok("prose".to_string()),
            Ok("prose".to_string()),
        ]);
        let err = client
            .generate_structured(&CompletionRequest::new("p"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidOutput { attempts: 3 }));
    }

    #[tokio::test]
    async fn structured_propagates_fatal_provider_error() {
        let client = client(vec![Err(ProviderError::Api {
            status: 401,
            message: "unauthorized".to_string(),
        })]);
        let err = client
            .generate_structured(&CompletionRequest::new("p"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 401, .. }));
        assert_eq!(client.provider().calls(), 1);
    }

    // -- extract_json_object ------------------------------------------------

    #[test]
    fn extracts_first_to_last_brace() {
        assert_eq!(
            extract_json_object("prefix {\"a\": {\"b\": 1}} suffix"),
            Some("{\"a\": {\"b\": 1}}")
        );
    }

    #[test]
    fn missing_braces_yield_none() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("only { open"), None);
        assert_eq!(extract_json_object("only } close"), None);
    }

    #[test]
    fn inverted_braces_yield_none() {
        assert_eq!(extract_json_object("} inverted {"), None);
    }
}
