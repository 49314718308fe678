//! Shared fixtures: a fake provider adapter that answers from a script.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use polaudit_core::ControlRow;
use polaudit_llm::{LlmClient, LlmError, Provider, ProviderAdapter, RetryPolicy};

/// Answers each call with the next scripted result and records the prompts.
pub struct FakeAdapter {
    provider: Provider,
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicU32,
}

impl FakeAdapter {
    pub fn new(provider: Provider, script: Vec<Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            provider,
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn send(&self, _model: &str, _system: &str, user_content: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(user_content.to_string());
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Config("fake adapter script exhausted".into())))
    }
}

/// A client whose only adapter is `adapter`, retrying quickly.
pub fn client(adapter: Arc<FakeAdapter>) -> Arc<LlmClient> {
    let retry = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(5),
        jitter: 0.0,
    };
    Arc::new(LlmClient::with_adapters([adapter as Arc<dyn ProviderAdapter>], retry))
}

/// Five ISO 27001 style controls.
pub fn controls() -> Vec<ControlRow> {
    vec![
        ControlRow::new("A.5.1", "Policies for information security", "Define and approve a policy set"),
        ControlRow::new("A.5.15", "Access control", "Establish access control rules"),
        ControlRow::new("A.5.17", "Authentication information", "Manage authentication secrets"),
        ControlRow::new("A.8.13", "Information backup", "Maintain and test backups"),
        ControlRow::new("A.8.15", "Logging", "Produce and protect activity logs"),
    ]
}

pub fn analysis_answer(verdict: &str, suggestions: &str) -> Result<String, LlmError> {
    let reason = if verdict == "yes" { "Section 3 covers it" } else { "" };
    Ok(serde_json::json!({
        "match": verdict,
        "if_yes_reason": reason,
        "suggestions": suggestions,
    })
    .to_string())
}
