//! OpenAI Chat Completions adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use super::{ProviderAdapter, post_json, text_at};
use crate::error::LlmError;
use crate::types::Provider;

/// Calls `POST {base}/v1/chat/completions` with a bearer token.
pub struct OpenAiAdapter {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    max_tokens: u32,
}

impl OpenAiAdapter {
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
impl ProviderAdapter for OpenAiAdapter {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn send(&self, model: &str, system_prompt: &str, user_content: &str) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| LlmError::Auth {
            provider: Provider::OpenAi,
            reason: "OPENAI_API_KEY is not set".into(),
        })?;

        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": model,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_content },
            ],
        });
        debug!(model, %url, "Sending OpenAI request");

        let request = self.http.post(&url).bearer_auth(api_key).json(&body);
        let resp = post_json(Provider::OpenAi, &self.base_url, request).await?;
        text_at(Provider::OpenAi, &resp, "/choices/0/message/content")
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn adapter(server: &MockServer, key: Option<&str>) -> OpenAiAdapter {
        OpenAiAdapter::new(Client::new(), server.uri(), key.map(str::to_string), 1024)
    }

    #[tokio::test]
    async fn sends_system_and_user_roles() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4.1",
                "max_tokens": 1024,
                "messages": [
                    { "role": "system", "content": "system" },
                    { "role": "user", "content": "user" },
                ],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "index": 0,
                    "message": { "role": "assistant", "content": "{\"key\": \"val\"}" },
                    "finish_reason": "stop",
                }],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = adapter(&server, Some("sk-test"))
            .send("gpt-4.1", "system", "user")
            .await
            .expect("send");
        assert_eq!(text, "{\"key\": \"val\"}");
    }

    #[tokio::test]
    async fn missing_key_is_auth_error() {
        let server = MockServer::start().await;
        let err = adapter(&server, None).send("m", "s", "u").await.unwrap_err();
        assert!(matches!(err, LlmError::Auth { provider: Provider::OpenAi, .. }));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn empty_choices_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = adapter(&server, Some("k")).send("m", "s", "u").await.unwrap_err();
        assert!(matches!(err, LlmError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn bad_request_is_permanent_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let err = adapter(&server, Some("k")).send("m", "s", "u").await.unwrap_err();
        assert!(matches!(err, LlmError::ProviderHttp { status: 400, .. }));
        assert_eq!(err.class(), crate::error::FailureClass::Permanent);
    }
}
