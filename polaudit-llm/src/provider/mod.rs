//! Provider adapters - one implementation of [`ProviderAdapter`] per backend.
//!
//! Each adapter sends a single system + user prompt and returns the raw text
//! of the first completion. Adapters never retry and never parse the model's
//! answer; that is the job of [`crate::retry`] and [`crate::extract`].

mod anthropic;
mod ollama;
mod openai;

pub use anthropic::AnthropicAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::debug;

use crate::error::LlmError;
use crate::types::Provider;

/// Sends one structured prompt to a provider and returns raw text.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which backend this adapter talks to.
    fn provider(&self) -> Provider;

    /// Perform one request. Exactly one network call per invocation, or none
    /// when the adapter fails fast on missing configuration.
    async fn send(&self, model: &str, system_prompt: &str, user_content: &str) -> Result<String, LlmError>;
}

/// Send a prepared JSON POST and decode the JSON body of a 2xx answer.
async fn post_json(
    provider: Provider,
    endpoint: &str,
    request: RequestBuilder,
) -> Result<Value, LlmError> {
    let resp = request
        .send()
        .await
        .map_err(|e| LlmError::from_transport(provider, endpoint, &e))?;

    let status = resp.status();
    if !status.is_success() {
        debug!(%provider, status = status.as_u16(), "Provider returned non-success status");
        return Err(LlmError::from_status(provider, status.as_u16()));
    }

    let body = resp
        .text()
        .await
        .map_err(|e| LlmError::from_transport(provider, endpoint, &e))?;
    serde_json::from_str(&body)
        .map_err(|e| LlmError::malformed(format!("{provider} response body is not JSON: {e}"), &body))
}

/// Pull a string out of a decoded response body, or report the body as malformed.
fn text_at(provider: Provider, body: &Value, pointer: &str) -> Result<String, LlmError> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            LlmError::malformed(
                format!("{provider} response has no text at {pointer}"),
                &body.to_string(),
            )
        })
}

/// Build the shared HTTP client with a per-request timeout.
pub(crate) fn http_client(timeout: std::time::Duration) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::Config(format!("could not build HTTP client: {e}")))
}
