//! Compliance analysis stage: one LLM call per control row.

use std::sync::Arc;

use polaudit_llm::{InvocationRequest, LlmClient, ResponseShape};
use serde::Deserialize;
use tracing::{Instrument, info, info_span, warn};

use crate::batch::BatchOutcome;
use crate::config::LimitsConfig;
use crate::error::{PipelineError, Result};
use crate::prompt::{analysis_prompt, truncate_chars};
use crate::types::{AnalysisRecord, ControlRow, MatchVerdict, StageRequest};

/// The model's raw answer, before value validation.
#[derive(Debug, Deserialize)]
struct AnalysisAnswer {
    #[serde(rename = "match")]
    verdict: String,
    if_yes_reason: String,
    suggestions: String,
}

/// Runs the analysis stage over a control list.
#[derive(Debug, Clone)]
pub struct AnalysisRunner {
    client: Arc<LlmClient>,
    limits: LimitsConfig,
}

impl AnalysisRunner {
    /// Create a runner sharing `client`.
    #[must_use]
    pub fn new(client: Arc<LlmClient>, limits: LimitsConfig) -> Self {
        Self { client, limits }
    }

    /// Analyse every row against `policy_text`, sequentially and in order.
    ///
    /// Never fails as a whole: each row yields a record or a row failure.
    pub async fn run(
        &self,
        stage: &StageRequest,
        rows: &[ControlRow],
        policy_text: &str,
    ) -> BatchOutcome<AnalysisRecord> {
        let policy = truncate_chars(policy_text, self.limits.max_policy_chars);
        if policy.len() < policy_text.len() {
            info!(
                max_chars = self.limits.max_policy_chars,
                "Policy text truncated for prompting"
            );
        }

        let mut outcome = BatchOutcome::with_capacity(rows.len());
        for row in rows {
            let span = info_span!("analyze_control", row_id = %row.id);
            let result = self.analyze_row(stage, row, policy).instrument(span).await;
            if let Err(e) = &result {
                warn!(row_id = %row.id, error = %e, "Control analysis failed, continuing");
            }
            outcome.record(&row.id, result);
        }

        info!(
            provider = %stage.provider,
            model = %stage.model,
            rows = outcome.len(),
            failed = outcome.failure_count(),
            "Analysis batch complete"
        );
        outcome
    }

    async fn analyze_row(&self, stage: &StageRequest, row: &ControlRow, policy: &str) -> Result<AnalysisRecord> {
        let request = InvocationRequest::new(
            &stage.provider,
            &stage.model,
            &stage.system_prompt,
            analysis_prompt(row, policy),
        );
        let answer: AnalysisAnswer = self
            .client
            .invoke_as(&request, &ResponseShape::analysis())
            .await?;
        validate_answer(row, &stage.model, answer, &self.limits)
    }
}

/// Enforce value constraints on a shape-valid answer.
fn validate_answer(
    row: &ControlRow,
    model: &str,
    answer: AnalysisAnswer,
    limits: &LimitsConfig,
) -> Result<AnalysisRecord> {
    let verdict = MatchVerdict::parse(&answer.verdict).ok_or_else(|| PipelineError::InvalidOutput {
        field: "match",
        reason: format!("expected yes, no or partial, got {:?}", answer.verdict),
    })?;

    Ok(AnalysisRecord {
        id: row.id.clone(),
        title: row.title.clone(),
        control: row.control.clone(),
        category: row.category.clone(),
        verdict,
        if_yes_reason: truncate_chars(&answer.if_yes_reason, limits.max_field_chars).to_string(),
        suggestions: truncate_chars(&answer.suggestions, limits.max_field_chars).to_string(),
        selected_llm1: model.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(verdict: &str, reason: &str) -> AnalysisAnswer {
        AnalysisAnswer {
            verdict: verdict.into(),
            if_yes_reason: reason.into(),
            suggestions: String::new(),
        }
    }

    #[test]
    fn verdict_is_normalized() {
        let row = ControlRow::new("1", "t", "c");
        let rec = validate_answer(&row, "gpt-4.1", answer(" Partial", ""), &LimitsConfig::default())
            .expect("valid");
        assert_eq!(rec.verdict, MatchVerdict::Partial);
        assert_eq!(rec.selected_llm1, "gpt-4.1");
    }

    #[test]
    fn unknown_verdict_is_rejected() {
        let row = ControlRow::new("1", "t", "c");
        let err = validate_answer(&row, "m", answer("maybe", ""), &LimitsConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidOutput { field: "match", .. }));
    }

    #[test]
    fn long_fields_are_capped() {
        let limits = LimitsConfig {
            max_field_chars: 5,
            ..LimitsConfig::default()
        };
        let row = ControlRow::new("1", "t", "c");
        let rec = validate_answer(&row, "m", answer("yes", "abcdefghij"), &limits).expect("valid");
        assert_eq!(rec.if_yes_reason, "abcde");
    }
}
