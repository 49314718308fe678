//! Ollama (local HTTP inference server) adapter.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::json;
use tracing::debug;

use super::{ProviderAdapter, post_json, text_at};
use crate::error::LlmError;
use crate::types::Provider;

/// Calls `POST {base}/api/chat` with streaming disabled.
pub struct OllamaAdapter {
    http: Client,
    base_url: String,
}

impl OllamaAdapter {
    /// Create an adapter for an already-normalized base URL. The URL is
    /// validated on every call, not here, so a bad `OLLAMA_HOST` does not
    /// stop the other providers from working.
    #[must_use]
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Reject an empty or malformed base URL without touching the network.
    fn validated_base(&self) -> Result<Url, LlmError> {
        let invalid = |reason: &str| LlmError::InvalidEndpoint {
            provider: Provider::Ollama,
            endpoint: self.base_url.clone(),
            reason: reason.to_string(),
        };

        if self.base_url.trim().is_empty() {
            return Err(invalid("OLLAMA_HOST is not configured"));
        }
        let url = Url::parse(&self.base_url).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(invalid("missing host"));
        }
        Ok(url)
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn provider(&self) -> Provider {
        Provider::Ollama
    }

    async fn send(&self, model: &str, system_prompt: &str, user_content: &str) -> Result<String, LlmError> {
        self.validated_base()?;

        let url = format!("{}/api/chat", self.base_url);
        let body = json!({
            "model": model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_content },
            ],
            "stream": false,
        });
        debug!(model, %url, "Sending Ollama request");

        let request = self.http.post(&url).json(&body);
        let resp = post_json(Provider::Ollama, &self.base_url, request).await?;
        text_at(Provider::Ollama, &resp, "/message/content")
    }
}
