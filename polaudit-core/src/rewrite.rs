//! Suggestion rewrite stage: turns analysis suggestions into report bullets.

use std::sync::Arc;

use polaudit_llm::{InvocationRequest, LlmClient, ResponseShape};
use serde::Deserialize;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::batch::BatchOutcome;
use crate::config::LimitsConfig;
use crate::error::Result;
use crate::prompt::{rewrite_prompt, truncate_chars};
use crate::types::{ControlRow, RewriteRecord, StageRequest};

#[derive(Debug, Deserialize)]
struct RewriteAnswer {
    rewritten_suggestions: Vec<String>,
}

/// Runs the rewrite stage over analysed rows.
#[derive(Debug, Clone)]
pub struct RewriteRunner {
    client: Arc<LlmClient>,
    limits: LimitsConfig,
}

impl RewriteRunner {
    /// Create a runner sharing `client`.
    #[must_use]
    pub fn new(client: Arc<LlmClient>, limits: LimitsConfig) -> Self {
        Self { client, limits }
    }

    /// Rewrite every row's suggestions, sequentially and in order.
    ///
    /// Rows without suggestions get an empty list and no LLM call.
    pub async fn run(&self, stage: &StageRequest, rows: &[ControlRow]) -> BatchOutcome<RewriteRecord> {
        let mut outcome = BatchOutcome::with_capacity(rows.len());
        for row in rows {
            let span = info_span!("rewrite_control", row_id = %row.id);
            let result = self.rewrite_row(stage, row).instrument(span).await;
            if let Err(e) = &result {
                warn!(row_id = %row.id, error = %e, "Suggestion rewrite failed, continuing");
            }
            outcome.record(&row.id, result);
        }

        info!(
            provider = %stage.provider,
            model = %stage.model,
            rows = outcome.len(),
            failed = outcome.failure_count(),
            "Rewrite batch complete"
        );
        outcome
    }

    async fn rewrite_row(&self, stage: &StageRequest, row: &ControlRow) -> Result<RewriteRecord> {
        let has_suggestions = row.suggestions.as_deref().is_some_and(|s| !s.trim().is_empty());
        if !has_suggestions {
            debug!("No suggestions to rewrite");
            return Ok(RewriteRecord {
                id: row.id.clone(),
                rewritten_suggestions: Vec::new(),
                selected_llm2: stage.model.clone(),
            });
        }

        let request = InvocationRequest::new(&stage.provider, &stage.model, &stage.system_prompt, rewrite_prompt(row));
        let answer: RewriteAnswer = self
            .client
            .invoke_as(&request, &ResponseShape::rewrite())
            .await?;

        Ok(RewriteRecord {
            id: row.id.clone(),
            rewritten_suggestions: cap_items(answer.rewritten_suggestions, &self.limits),
            selected_llm2: stage.model.clone(),
        })
    }
}

fn cap_items(items: Vec<String>, limits: &LimitsConfig) -> Vec<String> {
    items
        .iter()
        .take(limits.max_suggestion_items)
        .map(|item| truncate_chars(item, limits.max_suggestion_chars).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_count_and_length() {
        let limits = LimitsConfig {
            max_suggestion_items: 2,
            max_suggestion_chars: 3,
            ..LimitsConfig::default()
        };
        let out = cap_items(vec!["abcdef".into(), "xy".into(), "dropped".into()], &limits);
        assert_eq!(out, vec!["abc".to_string(), "xy".to_string()]);
    }
}
