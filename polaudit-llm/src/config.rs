//! Endpoint and transport configuration for the LLM client.
//!
//! [`EndpointConfig`] is built once at process start (normally from the
//! environment) and handed to [`crate::LlmClient::from_config`]. Nothing in
//! the invocation path reads the environment itself.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Provider;

/// Default Ollama address when `OLLAMA_HOST` is unset.
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
/// Public Anthropic API.
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
/// Public OpenAI API.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Credentials and base addresses for every provider.
#[derive(Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Anthropic API key. `None` makes every Anthropic call fail fast.
    pub anthropic_api_key: Option<String>,
    /// OpenAI API key. `None` makes every OpenAI call fail fast.
    pub openai_api_key: Option<String>,
    /// Normalized Ollama base URL (may be empty, validated per call).
    pub ollama_host: String,
    /// Anthropic base URL (normalized).
    pub anthropic_base_url: String,
    /// OpenAI base URL (normalized).
    pub openai_base_url: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            anthropic_api_key: None,
            openai_api_key: None,
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            anthropic_base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }
}

// Keys must never end up in logs.
impl std::fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("anthropic_api_key", &self.anthropic_api_key.as_ref().map(|_| "<set>"))
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<set>"))
            .field("ollama_host", &self.ollama_host)
            .field("anthropic_base_url", &self.anthropic_base_url)
            .field("openai_base_url", &self.openai_base_url)
            .finish()
    }
}

impl EndpointConfig {
    /// Read `ANTHROPIC_API_KEY`, `OPENAI_API_KEY`, `OLLAMA_HOST`,
    /// `ANTHROPIC_BASE_URL` and `OPENAI_BASE_URL` from the process environment.
    ///
    /// Missing credentials are not an error here.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment, a test map, ...).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let credential = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let url = |key: &str, default: &str| {
            normalize_base_url(&lookup(key).unwrap_or_else(|| default.to_string()))
        };

        Self {
            anthropic_api_key: credential("ANTHROPIC_API_KEY"),
            openai_api_key: credential("OPENAI_API_KEY"),
            ollama_host: url("OLLAMA_HOST", DEFAULT_OLLAMA_HOST),
            anthropic_base_url: url("ANTHROPIC_BASE_URL", DEFAULT_ANTHROPIC_BASE_URL),
            openai_base_url: url("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
        }
    }

    /// Whether a provider has what it needs to attempt a call.
    #[must_use]
    pub fn is_configured(&self, provider: Provider) -> bool {
        match provider {
            Provider::Anthropic => self.anthropic_api_key.is_some(),
            Provider::OpenAi => self.openai_api_key.is_some(),
            Provider::Ollama => !self.ollama_host.is_empty(),
        }
    }
}

/// Normalize a base address: prefix `http://` when no scheme is given and
/// strip trailing slashes. An empty input stays empty.
///
/// `"192.168.1.10:11434"` becomes `"http://192.168.1.10:11434"`;
/// `"http://host/"` becomes `"http://host"`.
#[must_use]
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    with_scheme.trim_end_matches('/').to_string()
}

/// Transport and retry settings, loadable from the `[llm]` TOML section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Maximum tokens each completion may generate.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Transport-level timeout per attempt, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retry behaviour for transient failures.
    #[serde(default)]
    pub retry: RetrySettings,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            retry: RetrySettings::default(),
        }
    }
}

impl LlmSettings {
    /// Per-attempt timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Retry settings (see [`crate::retry::RetryPolicy`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each time after.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Fractional jitter applied to each delay (0.1 = ±10%).
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

fn default_max_tokens() -> u32 {
    1024
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_jitter() -> f64 {
    0.1
}
