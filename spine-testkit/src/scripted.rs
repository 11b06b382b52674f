//! Scripted action executor.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use spine_domain::{Parameters, WorkflowInstruction, WorkflowStep};
use spine_exec::{ActionError, ActionExecutor};

/// Action executor with a fixed failure script.
///
/// Fails the first `failures` attempts it sees (across all steps), then
/// succeeds with `{ok: true, action}`. Counts every call.
pub struct ScriptedExecutor {
    failures: u32,
    delay: Duration,
    calls: AtomicU32,
}

impl ScriptedExecutor {
    /// Succeed on every attempt.
    pub fn succeeding() -> Self {
        Self::failing_first(0)
    }

    /// Fail the first `failures` attempts.
    pub fn failing_first(failures: u32) -> Self {
        Self {
            failures,
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    /// Fail on every attempt.
    pub fn always_failing() -> Self {
        Self::failing_first(u32::MAX)
    }

    /// Sleep this long on every attempt.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of attempts made so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        step: &WorkflowStep,
        _instruction: &WorkflowInstruction,
    ) -> Result<Parameters, ActionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst).saturating_add(1);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if call <= self.failures {
            return Err(ActionError::new(format!("scripted failure {}", call)));
        }

        let mut output = Parameters::new();
        output.insert("ok".to_string(), Value::Bool(true));
        output.insert("action".to_string(), Value::String(step.action.clone()));
        Ok(output)
    }
}
