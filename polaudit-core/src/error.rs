//! Error types for the polaudit pipeline stages.

use polaudit_llm::LlmError;
use thiserror::Error;

/// Top-level error type for pipeline operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The LLM invocation layer failed (already classified and retried).
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// The model answered with well-formed JSON carrying an unacceptable value.
    #[error("Invalid model output for `{field}`: {reason}")]
    InvalidOutput {
        /// Which answer field was rejected.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// A requested file name resolves outside the output directory.
    #[error("Invalid file name: {0:?}")]
    InvalidFilename(String),

    /// A requested file does not exist in the output directory.
    #[error("File not found in outputs: {0}")]
    NotFound(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Message suitable for showing to an operator.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Llm(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, PipelineError>;
