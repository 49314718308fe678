//! Core types shared by the pipeline stages.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// One compliance requirement row from the control framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRow {
    /// Control identifier (spreadsheet ids may be numeric).
    #[serde(default, deserialize_with = "id_from_scalar")]
    pub id: String,
    /// Short control title.
    #[serde(default)]
    pub title: String,
    /// The requirement text matched against the policy.
    #[serde(default)]
    pub control: String,
    /// Grouping used by the report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Suggestions from the analysis stage (input to the rewrite stage).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<String>,
}

impl ControlRow {
    /// Create a row with id, title and requirement text.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, control: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            control: control.into(),
            category: None,
            suggestions: None,
        }
    }

    /// Attach analysis suggestions.
    #[must_use]
    pub fn with_suggestions(mut self, suggestions: impl Into<String>) -> Self {
        self.suggestions = Some(suggestions.into());
        self
    }
}

fn id_from_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(D::Error::custom(format!("control id must be a string or number, got {other}"))),
    }
}

/// Which provider, model and instructions a stage runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRequest {
    /// Provider name as chosen by the caller.
    pub provider: String,
    /// Provider-specific model name.
    pub model: String,
    /// Fixed system prompt for every row of the batch.
    pub system_prompt: String,
}

impl StageRequest {
    /// Create a stage request.
    #[must_use]
    pub fn new(provider: impl Into<String>, model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            system_prompt: system_prompt.into(),
        }
    }
}

/// How well the policy covers a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchVerdict {
    /// Fully covered.
    Yes,
    /// Not covered.
    No,
    /// Partly covered.
    Partial,
}

impl MatchVerdict {
    /// Parse a model-supplied verdict, ignoring case and surrounding space.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "yes" => Some(Self::Yes),
            "no" => Some(Self::No),
            "partial" => Some(Self::Partial),
            _ => None,
        }
    }
}

impl fmt::Display for MatchVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Partial => "partial",
        })
    }
}

/// One analysed control, ready for the spreadsheet writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Control identifier.
    pub id: String,
    /// Control title, carried forward for the rewrite stage.
    pub title: String,
    /// Requirement text.
    pub control: String,
    /// Grouping, carried forward for the report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Coverage verdict.
    #[serde(rename = "match")]
    pub verdict: MatchVerdict,
    /// Why the policy covers the control, when it does.
    pub if_yes_reason: String,
    /// How to close the gap.
    pub suggestions: String,
    /// Model that produced this record.
    pub selected_llm1: String,
}

/// One rewritten set of suggestions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRecord {
    /// Control identifier.
    pub id: String,
    /// Report-ready suggestion bullets.
    pub rewritten_suggestions: Vec<String>,
    /// Model that produced this record.
    pub selected_llm2: String,
}
