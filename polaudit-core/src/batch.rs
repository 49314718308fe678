//! Per-row outcome collection for stage runners.
//!
//! A batch of N rows yields N outcomes in input order. One row's failure is
//! recorded against that row and never aborts the rest of the batch.

use serde::Serialize;

use crate::error::PipelineError;

/// Why a row failed, for callers deciding whether a re-run may help.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transient failures persisted through every retry.
    GaveUp,
    /// Retrying cannot help (credential, endpoint, unparseable output, ...).
    Permanent,
}

/// A row-level failure marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// Zero-based position of the row in the batch.
    pub index: usize,
    /// Control identifier of the row.
    pub row_id: String,
    /// Whether retries were exhausted or the failure was permanent.
    pub kind: FailureKind,
    /// Operator-facing description.
    pub message: String,
}

impl RowFailure {
    fn new(index: usize, row_id: &str, err: &PipelineError) -> Self {
        let kind = match err {
            PipelineError::Llm(e) if e.is_exhausted() => FailureKind::GaveUp,
            _ => FailureKind::Permanent,
        };
        Self {
            index,
            row_id: row_id.to_string(),
            kind,
            message: err.user_message(),
        }
    }
}

/// The outcome of one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome<T> {
    /// The row produced a record.
    Succeeded(T),
    /// The row failed; the batch carried on.
    Failed(RowFailure),
}

/// Ordered outcomes of a whole batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome<T> {
    rows: Vec<RowOutcome<T>>,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<T> BatchOutcome<T> {
    /// An empty outcome sized for `n` rows.
    #[must_use]
    pub fn with_capacity(n: usize) -> Self {
        Self { rows: Vec::with_capacity(n) }
    }

    /// Append the result for the next row.
    pub fn record(&mut self, row_id: &str, result: Result<T, PipelineError>) {
        let index = self.rows.len();
        self.rows.push(match result {
            Ok(record) => RowOutcome::Succeeded(record),
            Err(err) => RowOutcome::Failed(RowFailure::new(index, row_id, &err)),
        });
    }

    /// All outcomes, in input order.
    #[must_use]
    pub fn rows(&self) -> &[RowOutcome<T>] {
        &self.rows
    }

    /// Successful records, in input order.
    pub fn successes(&self) -> impl Iterator<Item = &T> {
        self.rows.iter().filter_map(|r| match r {
            RowOutcome::Succeeded(t) => Some(t),
            RowOutcome::Failed(_) => None,
        })
    }

    /// Row failures, in input order.
    pub fn failures(&self) -> impl Iterator<Item = &RowFailure> {
        self.rows.iter().filter_map(|r| match r {
            RowOutcome::Succeeded(_) => None,
            RowOutcome::Failed(f) => Some(f),
        })
    }

    /// Number of rows processed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows were processed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of failed rows.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// Serializable view: successful records and failures side by side.
    #[must_use]
    pub fn report(&self) -> BatchReport<'_, T> {
        BatchReport {
            results: self.successes().collect(),
            failures: self.failures().collect(),
        }
    }
}

/// What gets written to the stage's JSON output file.
#[derive(Debug, Serialize)]
pub struct BatchReport<'a, T> {
    /// Successful records, in input order.
    pub results: Vec<&'a T>,
    /// Row-level failures, in input order.
    pub failures: Vec<&'a RowFailure>,
}
