//! Configuration for the polaudit pipeline.
//!
//! Maps directly to `polaudit.toml`. Provider credentials are deliberately
//! absent: they come from [`polaudit_llm::EndpointConfig`].

use std::path::PathBuf;

use polaudit_llm::LlmSettings;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Top-level pipeline configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// LLM transport and retry settings.
    #[serde(default)]
    pub llm: LlmSettings,
    /// Caps on prompt input and model output.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Where stage outputs are written.
    #[serde(default)]
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `PipelineError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Resource and output-size limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Policy text sent with every analysis prompt is cut to this many chars.
    #[serde(default = "default_max_policy_chars")]
    pub max_policy_chars: usize,
    /// Cap on `if_yes_reason` and `suggestions` in analysis answers.
    #[serde(default = "default_max_field_chars")]
    pub max_field_chars: usize,
    /// Cap on the number of rewritten suggestions kept per row.
    #[serde(default = "default_max_suggestion_items")]
    pub max_suggestion_items: usize,
    /// Cap on each rewritten suggestion.
    #[serde(default = "default_max_suggestion_chars")]
    pub max_suggestion_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_policy_chars: default_max_policy_chars(),
            max_field_chars: default_max_field_chars(),
            max_suggestion_items: default_max_suggestion_items(),
            max_suggestion_chars: default_max_suggestion_chars(),
        }
    }
}

/// Output location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for generated files; created on demand.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_policy_chars() -> usize {
    50_000
}
fn default_max_field_chars() -> usize {
    4_000
}
fn default_max_suggestion_items() -> usize {
    10
}
fn default_max_suggestion_chars() -> usize {
    2_000
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = PipelineConfig::from_toml("").expect("parse");
        assert_eq!(cfg.general.log_level, "info");
        assert_eq!(cfg.llm.max_tokens, 1024);
        assert_eq!(cfg.llm.retry.max_attempts, 3);
        assert_eq!(cfg.limits, LimitsConfig::default());
        assert_eq!(cfg.output.dir, PathBuf::from("outputs"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = PipelineConfig::from_toml(
            r#"
            [llm]
            timeout_secs = 120

            [llm.retry]
            base_delay_ms = 250

            [limits]
            max_policy_chars = 1000

            [output]
            dir = "/srv/polaudit/outputs"
            "#,
        )
        .expect("parse");

        assert_eq!(cfg.llm.timeout_secs, 120);
        assert_eq!(cfg.llm.max_tokens, 1024);
        assert_eq!(cfg.llm.retry.base_delay_ms, 250);
        assert_eq!(cfg.llm.retry.max_attempts, 3);
        assert_eq!(cfg.limits.max_policy_chars, 1000);
        assert_eq!(cfg.limits.max_field_chars, 4_000);
        assert_eq!(cfg.output.dir, PathBuf::from("/srv/polaudit/outputs"));
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = PipelineConfig::from_toml("[llm\nmax_tokens = ").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
