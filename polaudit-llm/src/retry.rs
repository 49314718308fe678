//! Bounded retry with exponential backoff for transient failures.
//!
//! Modelled as an explicit state machine:
//!
//! ```text
//! Idle → Attempting ─┬─ ok ─────────────────────────→ Succeeded
//!                    ├─ permanent / last attempt ───→ Failed
//!                    └─ transient → RetryScheduled → Attempting
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::config::RetrySettings;
use crate::error::{FailureClass, LlmError};

/// Retry configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always at least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Fractional jitter; each delay is scaled by a factor in `[1-j, 1+j]`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(s: &RetrySettings) -> Self {
        Self {
            max_attempts: s.max_attempts.max(1),
            base_delay: Duration::from_millis(s.base_delay_ms),
            jitter: if s.jitter.is_finite() { s.jitter.clamp(0.0, 1.0) } else { 0.0 },
        }
    }
}

/// Where a retried operation currently is.
#[derive(Debug)]
pub enum RetryState<T> {
    /// Not started.
    Idle,
    /// Attempt `attempt` (1-based) is in flight.
    Attempting { attempt: u32 },
    /// Attempt `attempt` failed transiently; the next starts after `delay`.
    RetryScheduled { attempt: u32, delay: Duration },
    /// Finished with a value.
    Succeeded(Retried<T>),
    /// Finished with an error.
    Failed(LlmError),
}

/// A successful result plus the failures that preceded it.
#[derive(Debug)]
pub struct Retried<T> {
    /// The value returned by the successful attempt.
    pub value: T,
    /// Number of attempts made, including the successful one.
    pub attempts: u32,
    /// Errors from earlier, transiently failed attempts, oldest first.
    pub failures: Vec<LlmError>,
}

impl RetryPolicy {
    /// No retries at all.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            jitter: 0.0,
        }
    }

    /// Backoff before the attempt following attempt `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = 2u32.saturating_pow(attempt.saturating_sub(1));
        let base = self.base_delay.saturating_mul(exp);
        // NaN fails the comparison and falls through with no jitter.
        let jitter = self.jitter.clamp(0.0, 1.0);
        if !(jitter > 0.0) || base.is_zero() {
            return base;
        }
        let factor = rand::thread_rng().gen_range(1.0 - jitter..=1.0 + jitter);
        base.mul_f64(factor)
    }

    /// Run `operation`, retrying while [`LlmError::class`] says transient.
    pub async fn run<T, F, Fut>(&self, operation: F) -> Result<Retried<T>, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        self.run_classified(operation, LlmError::class).await
    }

    /// Run `operation` with a caller-supplied classifier.
    ///
    /// Permanent failures are returned unchanged after one attempt. When the
    /// last attempt fails transiently the error is wrapped in
    /// [`LlmError::RetriesExhausted`].
    pub async fn run_classified<T, F, Fut, C>(
        &self,
        mut operation: F,
        classify: C,
    ) -> Result<Retried<T>, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
        C: Fn(&LlmError) -> FailureClass,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut failures = Vec::new();
        let mut state = RetryState::Idle;

        loop {
            state = match state {
                RetryState::Idle => RetryState::Attempting { attempt: 1 },
                RetryState::Attempting { attempt } => match operation().await {
                    Ok(value) => {
                        if attempt > 1 {
                            debug!(attempt, "LLM call succeeded after retry");
                        }
                        RetryState::Succeeded(Retried {
                            value,
                            attempts: attempt,
                            failures: std::mem::take(&mut failures),
                        })
                    }
                    Err(err) if classify(&err) == FailureClass::Permanent => RetryState::Failed(err),
                    Err(err) if attempt >= max_attempts => {
                        warn!(attempts = attempt, error = %err, "LLM call failed, retries exhausted");
                        RetryState::Failed(LlmError::RetriesExhausted {
                            attempts: attempt,
                            last_error: Box::new(err),
                        })
                    }
                    Err(err) => {
                        let delay = self.delay_after(attempt);
                        warn!(
                            attempt,
                            max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Transient LLM failure, retrying"
                        );
                        failures.push(err);
                        RetryState::RetryScheduled { attempt, delay }
                    }
                },
                RetryState::RetryScheduled { attempt, delay } => {
                    tokio::time::sleep(delay).await;
                    RetryState::Attempting { attempt: attempt + 1 }
                }
                RetryState::Succeeded(retried) => return Ok(retried),
                RetryState::Failed(err) => return Err(err),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::types::Provider;

    fn connect() -> LlmError {
        LlmError::Connect {
            provider: Provider::Ollama,
            endpoint: "http://10.0.0.5:11434".into(),
            message: "connection refused".into(),
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            jitter: 0.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let out = policy()
            .run(move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err(connect()) } else { Ok("done") }
            })
            .await
            .expect("should succeed");

        assert_eq!(out.value, "done");
        assert_eq!(out.attempts, 3);
        assert_eq!(out.failures.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_three_transient_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let err = policy()
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(LlmError::ProviderHttp {
                    provider: Provider::OpenAi,
                    status: 503,
                })
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let LlmError::RetriesExhausted { attempts, last_error } = err else {
            panic!("expected RetriesExhausted, got {err:?}");
        };
        assert_eq!(attempts, 3);
        assert!(matches!(*last_error, LlmError::ProviderHttp { status: 503, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error_is_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let err = policy()
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(LlmError::Auth {
                    provider: Provider::Anthropic,
                    reason: "ANTHROPIC_API_KEY is not set".into(),
                })
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, LlmError::Auth { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_between_attempts() {
        let start = tokio::time::Instant::now();
        let _ = policy()
            .run(|| async { Err::<(), _>(connect()) })
            .await;
        // 100ms + 200ms with jitter disabled.
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_classifier_is_respected() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let _ = policy()
            .run_classified(
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(connect())
                },
                |_| FailureClass::Permanent,
            )
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn jittered_delay_stays_in_band() {
        let p = RetryPolicy {
            jitter: 0.1,
            ..policy()
        };
        for _ in 0..100 {
            let d = p.delay_after(2);
            assert!(d >= Duration::from_millis(180) && d <= Duration::from_millis(220));
        }
    }

    #[test]
    fn nan_jitter_from_config_disables_jitter() {
        let p = RetryPolicy::from(&RetrySettings {
            jitter: f64::NAN,
            ..RetrySettings::default()
        });
        assert_eq!(p.jitter, 0.0);
        assert_eq!(p.delay_after(1), Duration::from_millis(500));
    }

    #[test]
    fn out_of_range_jitter_on_a_built_policy_is_clamped() {
        let nan = RetryPolicy {
            jitter: f64::NAN,
            ..policy()
        };
        assert_eq!(nan.delay_after(2), Duration::from_millis(200));

        let wide = RetryPolicy {
            jitter: 1.5,
            ..policy()
        };
        for _ in 0..100 {
            assert!(wide.delay_after(1) <= Duration::from_millis(200));
        }
    }

    #[test]
    fn settings_clamp_to_one_attempt() {
        let p = RetryPolicy::from(&RetrySettings {
            max_attempts: 0,
            base_delay_ms: 10,
            jitter: 5.0,
        });
        assert_eq!(p.max_attempts, 1);
        assert!((p.jitter - 1.0).abs() < f64::EPSILON);
    }
}
