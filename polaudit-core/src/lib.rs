//! # polaudit Core Library
//!
//! Pipeline stages that run a client's policy document against a control
//! framework, one LLM call per control:
//!
//! - **Analysis** - does the policy cover the control? (`yes` / `no` /
//!   `partial`, with a reason and gap suggestions)
//! - **Rewrite** - turn the gap suggestions into report-ready bullets
//!
//! Both stages go through [`polaudit_llm::LlmClient`] and isolate failures
//! per row: a batch of N rows always yields N ordered outcomes.
//!
//! Spreadsheet parsing, document generation, and HTTP serving are left to
//! the caller; this crate consumes [`ControlRow`]s and produces
//! serializable records.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod analysis;
pub mod batch;
pub mod config;
pub mod error;
pub mod outputs;
pub mod prompt;
pub mod rewrite;
pub mod types;

pub use analysis::AnalysisRunner;
pub use batch::{BatchOutcome, FailureKind, RowFailure, RowOutcome};
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use outputs::OutputStore;
pub use rewrite::RewriteRunner;
pub use types::*;
