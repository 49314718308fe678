//! Anthropic Messages API adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::{ProviderAdapter, post_json};
use crate::error::LlmError;
use crate::types::Provider;

const API_VERSION: &str = "2023-06-01";

/// Calls `POST {base}/v1/messages` with an `x-api-key` header.
pub struct AnthropicAdapter {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    max_tokens: u32,
}

impl AnthropicAdapter {
    /// Create an adapter. A `None` key makes every call fail with
    /// [`LlmError::Auth`] before touching the network.
    #[must_use]
    pub fn new(http: Client, base_url: impl Into<String>, api_key: Option<String>, max_tokens: u32) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
            max_tokens,
        }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn send(&self, model: &str, system_prompt: &str, user_content: &str) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| LlmError::Auth {
            provider: Provider::Anthropic,
            reason: "ANTHROPIC_API_KEY is not set".into(),
        })?;

        let url = format!("{}/v1/messages", self.base_url);
        let body = json!({
            "model": model,
            "max_tokens": self.max_tokens,
            "system": system_prompt,
            "messages": [
                { "role": "user", "content": user_content },
            ],
        });
        debug!(model, %url, "Sending Anthropic request");

        let request = self
            .http
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body);
        let resp = post_json(Provider::Anthropic, &self.base_url, request).await?;

        // The first content block carrying text; thinking blocks have none.
        resp.get("content")
            .and_then(Value::as_array)
            .and_then(|blocks| blocks.iter().find_map(|b| b.get("text").and_then(Value::as_str)))
            .map(str::to_string)
            .ok_or_else(|| LlmError::malformed("anthropic response has no text block", &resp.to_string()))
    }
}
