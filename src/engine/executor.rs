//! Single-step execution.
//!
//! [`StepExecutor::execute`] runs one step through a fixed pipeline: stop
//! and skip gates, type normalization, parameter resolution, handler
//! dispatch under the retry policy, output capture, and event emission.
//! Handler failures never escape - a failing step produces a `failed`
//! [`StepResult`] and the coordinator decides whether the run continues.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::engine::capability::{ActionRequest, Capability, HandlerError, HandlerRegistry};
use crate::engine::events::{EventSink, RunEvent};
use crate::engine::interpolation::resolve_params;
use crate::engine::registry::RunControl;
use crate::engine::retry::RetryPolicy;
use crate::engine::variables::{ReferenceTrace, VariableStore};
use crate::session::BrowserSession;
use crate::testcase::schema::StepSpec;

/// Terminal status of one executed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
    Stopped,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Outcome of executing one step. Appended to the run record, never
/// mutated afterward.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    /// Position of the step within the test case.
    pub index: usize,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Handler invocations made (0 when no handler ran).
    pub attempts: u32,
    /// Failure message, when the step did not succeed.
    pub error: Option<String>,
    /// Raw handler result, when one was returned.
    pub captured: Option<Value>,
}

impl StepResult {
    fn terminal(index: usize, status: StepStatus) -> Self {
        let now = Utc::now();
        Self {
            index,
            status,
            started_at: now,
            finished_at: now,
            duration_ms: 0,
            attempts: 0,
            error: None,
            captured: None,
        }
    }
}

/// Executes steps against a variable store and browser session.
pub struct StepExecutor<'a> {
    pub run_id: &'a str,
    pub handlers: &'a HandlerRegistry,
    pub policy: &'a RetryPolicy,
    pub events: &'a dyn EventSink,
    /// Handler timeout applied when a step carries no override.
    pub default_timeout: Duration,
}

impl StepExecutor<'_> {
    /// Execute one step.
    pub fn execute(
        &self,
        step: &StepSpec,
        index: usize,
        total: usize,
        store: &VariableStore,
        control: &RunControl,
        session: &mut dyn BrowserSession,
    ) -> StepResult {
        if control.should_stop() {
            let result = StepResult::terminal(index, StepStatus::Stopped);
            self.emit_finished(&result);
            return result;
        }

        if step.skip {
            debug!("{}: step {} skipped by flag", self.run_id, index);
            let result = StepResult::terminal(index, StepStatus::Skipped);
            self.emit_finished(&result);
            return result;
        }

        let Some(capability) = Capability::normalize(&step.type_tag) else {
            let mut result = StepResult::terminal(index, StepStatus::Failed);
            result.error = Some(format!("unsupported action type '{}'", step.type_tag));
            self.emit_finished(&result);
            return result;
        };

        // Resolve ${...} references against values from earlier steps.
        // Failures degrade to the literal text and are traced, never fatal.
        let resolution = resolve_params(&step.effective_params(), store);
        for outcome in &resolution.outcomes {
            store.record_trace(ReferenceTrace::from_outcome(index, outcome));
        }
        for failure in resolution.failures() {
            warn!(
                "{}: step {} left '{}' unresolved in '{}': {}",
                self.run_id,
                index,
                failure.expression,
                failure.parameter,
                failure.message.as_deref().unwrap_or("unknown")
            );
        }

        let Some(handler) = self.handlers.get(capability) else {
            let mut result = StepResult::terminal(index, StepStatus::Failed);
            result.error = Some(format!("no handler registered for '{capability}'"));
            self.emit_finished(&result);
            return result;
        };

        self.events.notify(&RunEvent::StepStarted {
            run_id: self.run_id.to_string(),
            step_index: index,
            total_steps: total,
            capability,
            description: step.description.clone(),
        });

        let request = ActionRequest {
            capability,
            params: resolution.value.clone(),
            timeout: step
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(self.default_timeout),
            description: step.description.clone(),
        };

        let started_at = Utc::now();
        let mut attempts = 0u32;
        let outcome = loop {
            attempts += 1;
            match handler.perform(session, &request) {
                Ok(value) => break Ok(value),
                Err(error) => {
                    if !self.policy.should_retry(&error, attempts) {
                        break Err(error);
                    }
                    let delay = self.policy.backoff(&error, attempts);
                    warn!(
                        "{}: step {} attempt {} failed ({}), retrying in {:?}",
                        self.run_id, index, attempts, error, delay
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
            }
        };
        let finished_at = Utc::now();

        let mut result = StepResult {
            index,
            status: StepStatus::Success,
            started_at,
            finished_at,
            duration_ms: duration_ms_between(started_at, finished_at),
            attempts,
            error: None,
            captured: None,
        };

        match outcome {
            Ok(value) => {
                if let Some(name) = &step.output_variable {
                    match &value {
                        Some(value) => store.set(
                            name,
                            value.clone(),
                            index,
                            capability.as_str(),
                            resolution.value,
                        ),
                        None => warn!(
                            "{}: step {} produced no value to capture as '{}'",
                            self.run_id, index, name
                        ),
                    }
                }
                result.captured = value;
            }
            Err(error) => {
                result.status = StepStatus::Failed;
                result.error = Some(describe_failure(&error, attempts, self.policy));
            }
        }

        self.emit_finished(&result);
        result
    }

    fn emit_finished(&self, result: &StepResult) {
        self.events.notify(&RunEvent::StepFinished {
            run_id: self.run_id.to_string(),
            step_index: result.index,
            status: result.status,
            duration_ms: result.duration_ms,
            attempts: result.attempts,
            error: result.error.clone(),
        });
    }
}

fn describe_failure(error: &HandlerError, attempts: u32, policy: &RetryPolicy) -> String {
    if error.is_transient() && attempts >= policy.max_attempts {
        format!("{error} (after {attempts} attempts)")
    } else {
        error.to_string()
    }
}

fn duration_ms_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    end.signed_duration_since(start)
        .num_milliseconds()
        .max(0) as u64
}
