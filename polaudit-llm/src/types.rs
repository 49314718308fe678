//! Core types for LLM requests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// The closed set of supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Anthropic Messages API (API key).
    Anthropic,
    /// OpenAI Chat Completions API (API key).
    #[serde(rename = "openai")]
    OpenAi,
    /// Locally hosted Ollama server (base URL, no credential).
    Ollama,
}

impl Provider {
    /// All supported providers, in display order.
    #[must_use]
    pub fn all() -> &'static [Provider] {
        &[Self::Anthropic, Self::OpenAi, Self::Ollama]
    }

    /// Wire name used by callers to select this provider.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }

    /// Models the front end offers for this provider.
    #[must_use]
    pub fn advertised_models(self) -> &'static [&'static str] {
        match self {
            Self::Anthropic => &["claude-haiku-4-5", "claude-sonnet-4-5"],
            Self::OpenAi => &["gpt-5.2", "gpt-4.1"],
            Self::Ollama => &["gemma3:4b", "deepseek-r1:1.5b"],
        }
    }

    /// Environment variable holding this provider's credential, if it has one.
    #[must_use]
    pub fn credential_var(self) -> Option<&'static str> {
        match self {
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Ollama => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(LlmError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// One structured prompt to send to a provider.
///
/// `provider` is the name exactly as supplied by the caller; the client
/// resolves it to a [`Provider`] at invocation time.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationRequest {
    /// Provider name (`anthropic`, `openai`, `ollama`).
    pub provider: String,
    /// Provider-specific model name.
    pub model: String,
    /// Instructions, sent under the system role.
    pub system_prompt: String,
    /// Row-specific content, sent under the user role.
    pub user_content: String,
}

impl InvocationRequest {
    /// Create a new request.
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        user_content: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            system_prompt: system_prompt.into(),
            user_content: user_content.into(),
        }
    }
}
