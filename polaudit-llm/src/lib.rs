//! # polaudit-llm - LLM Invocation Layer for polaudit
//!
//! Normalizes three heterogeneous LLM backends behind one contract:
//!   - **Anthropic** Messages API (API key)
//!   - **OpenAI** Chat Completions API (API key)
//!   - **Ollama** (locally hosted HTTP inference server)
//!
//! Every LLM call in polaudit goes through [`LlmClient::invoke`], ensuring:
//!   - Strict JSON answers, extracted from surrounding prose
//!   - Classified errors (transient vs. permanent)
//!   - Bounded retry with exponential backoff on transient failures
//!
//! # Architecture
//!
//! ```text
//! InvocationRequest ─→ LlmClient ─→ RetryPolicy ─→ ProviderAdapter ─→ raw text
//!                                                                      │
//!            structured JSON ←── extract(raw, ResponseShape) ←─────────┘
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod provider;
pub mod retry;
pub mod types;

pub use client::LlmClient;
pub use config::{EndpointConfig, LlmSettings, RetrySettings, normalize_base_url};
pub use error::{FailureClass, LlmError};
pub use extract::{FieldKind, ResponseShape};
pub use provider::ProviderAdapter;
pub use retry::{Retried, RetryPolicy};
pub use types::{InvocationRequest, Provider};
