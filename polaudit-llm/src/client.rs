//! LLM Client - unified interface for Anthropic, OpenAI, and Ollama backends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{EndpointConfig, LlmSettings};
use crate::error::LlmError;
use crate::extract::{self, ResponseShape};
use crate::provider::{self, AnthropicAdapter, OllamaAdapter, OpenAiAdapter, ProviderAdapter};
use crate::retry::RetryPolicy;
use crate::types::{InvocationRequest, Provider};

/// The composition root: resolves a provider, calls its adapter under the
/// retry policy, and extracts the JSON answer.
///
/// Holds no per-call state, so one client can be shared (behind an `Arc`)
/// across concurrent batches.
#[derive(Clone)]
pub struct LlmClient {
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut providers: Vec<_> = self.adapters.keys().map(|p| p.as_str()).collect();
        providers.sort_unstable();
        f.debug_struct("LlmClient")
            .field("providers", &providers)
            .field("retry", &self.retry)
            .finish()
    }
}

impl LlmClient {
    /// Build a client with the three real adapters.
    ///
    /// # Errors
    /// Returns [`LlmError::Config`] if the HTTP client cannot be built.
    /// Missing credentials are not an error until that provider is invoked.
    pub fn from_config(endpoints: &EndpointConfig, settings: &LlmSettings) -> Result<Self, LlmError> {
        let http = provider::http_client(settings.timeout())?;
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![
            Arc::new(AnthropicAdapter::new(
                http.clone(),
                &endpoints.anthropic_base_url,
                endpoints.anthropic_api_key.clone(),
                settings.max_tokens,
            )),
            Arc::new(OpenAiAdapter::new(
                http.clone(),
                &endpoints.openai_base_url,
                endpoints.openai_api_key.clone(),
                settings.max_tokens,
            )),
            Arc::new(OllamaAdapter::new(http, &endpoints.ollama_host)),
        ];
        Ok(Self::with_adapters(adapters, RetryPolicy::from(&settings.retry)))
    }

    /// Build a client from arbitrary adapters (one per provider; later
    /// entries replace earlier ones for the same provider).
    pub fn with_adapters(
        adapters: impl IntoIterator<Item = Arc<dyn ProviderAdapter>>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            adapters: adapters.into_iter().map(|a| (a.provider(), a)).collect(),
            retry,
        }
    }

    /// The retry policy applied to every invocation.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Invoke the provider named in `request` and return the JSON object in
    /// its answer that matches `shape`.
    ///
    /// # Errors
    /// [`LlmError::UnsupportedProvider`] for unknown names (no network call),
    /// the adapter's classified error, [`LlmError::RetriesExhausted`] after
    /// repeated transient failures, or [`LlmError::MalformedResponse`].
    pub async fn invoke(&self, request: &InvocationRequest, shape: &ResponseShape) -> Result<Value, LlmError> {
        let provider: Provider = request.provider.parse()?;
        let adapter = self
            .adapters
            .get(&provider)
            .ok_or_else(|| LlmError::UnsupportedProvider(request.provider.clone()))?;

        debug!(%provider, model = %request.model, "Invoking LLM");
        let start = Instant::now();
        let outcome = self
            .retry
            .run(|| adapter.send(&request.model, &request.system_prompt, &request.user_content))
            .await?;

        let latency_ms = start.elapsed().as_millis() as u64;
        debug!(
            %provider,
            model = %request.model,
            attempts = outcome.attempts,
            latency_ms,
            "LLM call completed"
        );

        extract::extract(&outcome.value, shape).inspect_err(|e| {
            warn!(%provider, model = %request.model, error = %e, "LLM answer did not match expected shape");
        })
    }

    /// Like [`LlmClient::invoke`], deserializing the answer into `T`.
    ///
    /// # Errors
    /// As [`LlmClient::invoke`]; a deserialization failure is reported as
    /// [`LlmError::MalformedResponse`].
    pub async fn invoke_as<T: DeserializeOwned>(
        &self,
        request: &InvocationRequest,
        shape: &ResponseShape,
    ) -> Result<T, LlmError> {
        let value = self.invoke(request, shape).await?;
        let raw = value.to_string();
        serde_json::from_value(value).map_err(|e| LlmError::malformed(e.to_string(), &raw))
    }

    /// Check if the client has an adapter for `provider`.
    #[must_use]
    pub fn is_available(&self, provider: Provider) -> bool {
        self.adapters.contains_key(&provider)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;

    /// Replays scripted answers and counts calls.
    struct Scripted {
        provider: Provider,
        answers: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(provider: Provider, answers: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                provider,
                answers: Mutex::new(answers.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProviderAdapter for Scripted {
        fn provider(&self) -> Provider {
            self.provider
        }

        async fn send(&self, _: &str, _: &str, _: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::Config("script exhausted".into())))
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            jitter: 0.0,
        }
    }

    fn request(provider: &str) -> InvocationRequest {
        InvocationRequest::new(provider, "model", "sys", "usr")
    }

    fn client_with(adapters: Vec<Arc<Scripted>>) -> LlmClient {
        LlmClient::with_adapters(
            adapters.into_iter().map(|a| a as Arc<dyn ProviderAdapter>),
            fast_retry(),
        )
    }

    const VALID: &str = r#"{"match": "yes", "if_yes_reason": "ok", "suggestions": ""}"#;

    #[tokio::test]
    async fn each_provider_routes_to_its_adapter() {
        for provider in Provider::all() {
            let adapter = Scripted::new(*provider, vec![Ok(VALID.into())]);
            let client = client_with(vec![adapter.clone()]);
            let value = client
                .invoke(&request(provider.as_str()), &ResponseShape::analysis())
                .await
                .expect("invoke");
            assert_eq!(value["match"], "yes");
            assert_eq!(adapter.calls(), 1);
        }
    }

    #[tokio::test]
    async fn unsupported_provider_makes_no_calls() {
        let adapters: Vec<_> = Provider::all()
            .iter()
            .map(|p| Scripted::new(*p, vec![Ok(VALID.into())]))
            .collect();
        let client = client_with(adapters.clone());

        let err = client
            .invoke(&request("mistral-cloud"), &ResponseShape::analysis())
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::UnsupportedProvider(ref n) if n == "mistral-cloud"));
        assert!(adapters.iter().all(|a| a.calls() == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_transparently() {
        let adapter = Scripted::new(
            Provider::Ollama,
            vec![
                Err(LlmError::Timeout { provider: Provider::Ollama }),
                Err(LlmError::ProviderHttp { provider: Provider::Ollama, status: 502 }),
                Ok(format!("Here you go:\n{VALID}\nHope this helps!")),
            ],
        );
        let client = client_with(vec![adapter.clone()]);

        let value = client
            .invoke(&request("ollama"), &ResponseShape::analysis())
            .await
            .expect("invoke");
        assert_eq!(value, json!({"match": "yes", "if_yes_reason": "ok", "suggestions": ""}));
        assert_eq!(adapter.calls(), 3);
    }

    #[tokio::test]
    async fn malformed_answer_is_not_retried() {
        let adapter = Scripted::new(Provider::OpenAi, vec![Ok("not-json".into()), Ok(VALID.into())]);
        let client = client_with(vec![adapter.clone()]);

        let err = client
            .invoke(&request("openai"), &ResponseShape::analysis())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::MalformedResponse { .. }));
        assert_eq!(adapter.calls(), 1);
    }

    #[tokio::test]
    async fn auth_failure_is_not_retried() {
        let adapter = Scripted::new(
            Provider::Anthropic,
            vec![Err(LlmError::Auth {
                provider: Provider::Anthropic,
                reason: "ANTHROPIC_API_KEY is not set".into(),
            })],
        );
        let client = client_with(vec![adapter.clone()]);

        let err = client
            .invoke(&request("anthropic"), &ResponseShape::analysis())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Auth { .. }));
        assert_eq!(adapter.calls(), 1);
    }

    #[tokio::test]
    async fn typed_invoke() {
        #[derive(serde::Deserialize)]
        struct Rewrite {
            rewritten_suggestions: Vec<String>,
        }
        let adapter = Scripted::new(
            Provider::Anthropic,
            vec![Ok(r#"{"rewritten_suggestions": ["Adopt MFA"]}"#.into())],
        );
        let client = client_with(vec![adapter]);
        let out: Rewrite = client
            .invoke_as(&request("anthropic"), &ResponseShape::rewrite())
            .await
            .expect("invoke");
        assert_eq!(out.rewritten_suggestions, vec!["Adopt MFA".to_string()]);
    }

    #[tokio::test]
    async fn from_config_without_keys_fails_fast() {
        let client = LlmClient::from_config(&EndpointConfig::default(), &LlmSettings::default())
            .expect("client");
        for p in Provider::all() {
            assert!(client.is_available(*p));
        }
        let err = client
            .invoke(&request("openai"), &ResponseShape::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Auth { provider: Provider::OpenAi, .. }));
    }
}
