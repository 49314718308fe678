//! LLM error types.
//!
//! Every failure the invocation layer can produce is classified exactly once,
//! via [`LlmError::class`], into transient (worth retrying) or permanent.

use thiserror::Error;

use crate::types::Provider;

/// Maximum number of characters of raw model output kept for diagnosis.
pub const SNIPPET_CHARS: usize = 200;

/// Whether retrying an operation that failed with a given error may help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Network blip, server overload, timeout.
    Transient,
    /// Bad credential, malformed request, unparseable output.
    Permanent,
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The provider name is not one of the supported backends.
    #[error("Unsupported LLM provider: {0:?}")]
    UnsupportedProvider(String),

    /// Missing or rejected credential.
    #[error("{provider} authentication failed: {reason}")]
    Auth {
        /// Provider that rejected the call.
        provider: Provider,
        /// What went wrong with the credential.
        reason: String,
    },

    /// The local provider's base URL is empty or malformed.
    #[error("Invalid {provider} endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        /// Provider whose endpoint is misconfigured.
        provider: Provider,
        /// The configured base URL, as given.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Network, DNS, or connection-refused failure.
    #[error("Could not connect to {provider} at {endpoint}: {message}")]
    Connect {
        /// Provider that could not be reached.
        provider: Provider,
        /// Base URL the request went to.
        endpoint: String,
        /// Transport error text.
        message: String,
    },

    /// Transport-level timeout.
    #[error("{provider} request timed out")]
    Timeout {
        /// Provider that timed out.
        provider: Provider,
    },

    /// Non-2xx response from the provider.
    #[error("{provider} returned HTTP {status}")]
    ProviderHttp {
        /// Provider that answered.
        provider: Provider,
        /// HTTP status code.
        status: u16,
    },

    /// No JSON object matching the expected shape could be located.
    #[error("Malformed LLM response ({reason}); raw text: {snippet:?}")]
    MalformedResponse {
        /// What was wrong with the response.
        reason: String,
        /// First [`SNIPPET_CHARS`] characters of the raw text.
        snippet: String,
    },

    /// All retry attempts exhausted on transient failures.
    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Total attempts made.
        attempts: u32,
        /// The final transient failure.
        #[source]
        last_error: Box<LlmError>,
    },

    /// Configuration error (e.g. the HTTP client could not be built).
    #[error("LLM configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Build a [`LlmError::MalformedResponse`], truncating the raw text.
    pub fn malformed(reason: impl Into<String>, raw: &str) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            snippet: snippet(raw),
        }
    }

    /// Map a transport error from `reqwest` onto the taxonomy.
    pub fn from_transport(provider: Provider, endpoint: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout { provider }
        } else if err.is_builder() {
            // Only the local provider's address is operator-supplied.
            match provider {
                Provider::Ollama => Self::InvalidEndpoint {
                    provider,
                    endpoint: endpoint.to_string(),
                    reason: err.to_string(),
                },
                Provider::Anthropic | Provider::OpenAi => {
                    Self::Config(format!("{provider} request to {endpoint} could not be built: {err}"))
                }
            }
        } else {
            Self::Connect {
                provider,
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Map a non-2xx HTTP status onto the taxonomy.
    #[must_use]
    pub fn from_status(provider: Provider, status: u16) -> Self {
        match status {
            401 | 403 => Self::Auth {
                provider,
                reason: format!("credential rejected (HTTP {status})"),
            },
            _ => Self::ProviderHttp { provider, status },
        }
    }

    /// Classify this error for the retry policy.
    #[must_use]
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Connect { .. } | Self::Timeout { .. } => FailureClass::Transient,
            Self::ProviderHttp { status, .. } if *status >= 500 => FailureClass::Transient,
            Self::UnsupportedProvider(_)
            | Self::Auth { .. }
            | Self::InvalidEndpoint { .. }
            | Self::ProviderHttp { .. }
            | Self::MalformedResponse { .. }
            | Self::RetriesExhausted { .. }
            | Self::Config(_) => FailureClass::Permanent,
        }
    }

    /// Whether this error is the "gave up after retries" outcome.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }

    /// The underlying failure, looking through [`LlmError::RetriesExhausted`].
    #[must_use]
    pub fn root(&self) -> &LlmError {
        match self {
            Self::RetriesExhausted { last_error, .. } => last_error.root(),
            other => other,
        }
    }

    /// Message suitable for showing to an operator.
    ///
    /// Local-provider endpoint and connection failures point at the
    /// `OLLAMA_HOST` setting, since a loopback address is not reachable from
    /// inside an isolated network namespace such as a container.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self.root() {
            Self::InvalidEndpoint {
                provider: Provider::Ollama,
                endpoint,
                ..
            }
            | Self::Connect {
                provider: Provider::Ollama,
                endpoint,
                ..
            } => format!(
                "Could not reach the local Ollama server at {endpoint:?}. Set OLLAMA_HOST to an \
                 address reachable from this process (e.g. 192.168.1.10:11434); localhost or \
                 127.0.0.1 does not reach the host machine from inside a container."
            ),
            Self::Auth { provider, .. } => format!(
                "{provider} rejected the request: check that {} is set and valid.",
                provider.credential_var().unwrap_or("the credential")
            ),
            _ => self.to_string(),
        }
    }
}

/// First [`SNIPPET_CHARS`] characters of `raw`, cut on a char boundary.
#[must_use]
pub fn snippet(raw: &str) -> String {
    raw.chars().take(SNIPPET_CHARS).collect()
}
