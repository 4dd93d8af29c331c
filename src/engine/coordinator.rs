//! Run lifecycle coordination.
//!
//! A [`RunCoordinator`] owns one run from start to finish: it moves the
//! record from `pending` to `running`, acquires the run's private browser
//! session, walks the steps in order through the executor, and settles on
//! a terminal status. Cancellation is cooperative - the stop flag is
//! checked between steps, never preempting an in-flight handler call.
//!
//! The session is released on every exit path, including session
//! acquisition failure and a panicking handler; a run can fail, but it
//! cannot leak its browser.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, warn};

use crate::engine::capability::HandlerRegistry;
use crate::engine::events::{EventSink, RunEvent};
use crate::engine::executor::{StepExecutor, StepStatus};
use crate::engine::registry::{LogLevel, RunAggregate, RunStatus, Screenshot};
use crate::engine::retry::RetryPolicy;
use crate::session::{BrowserSession, SessionMode, SessionProvider};
use crate::testcase::TestCase;

/// Options for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Browser presentation mode.
    pub mode: SessionMode,
    /// End the run after the first failed step instead of continuing.
    pub stop_on_failure: bool,
    /// Handler timeout for steps without their own override.
    pub default_timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: SessionMode::Headless,
            stop_on_failure: false,
            default_timeout: Duration::from_secs(30),
        }
    }
}

/// Drives one run on its worker thread.
pub struct RunCoordinator {
    aggregate: Arc<RunAggregate>,
    case: TestCase,
    options: RunOptions,
    handlers: Arc<HandlerRegistry>,
    policy: RetryPolicy,
    provider: Arc<dyn SessionProvider>,
    events: Arc<dyn EventSink>,
}

impl RunCoordinator {
    pub fn new(
        aggregate: Arc<RunAggregate>,
        case: TestCase,
        options: RunOptions,
        handlers: Arc<HandlerRegistry>,
        policy: RetryPolicy,
        provider: Arc<dyn SessionProvider>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            aggregate,
            case,
            options,
            handlers,
            policy,
            provider,
            events,
        }
    }

    /// Execute the run to a terminal status. Never panics outward.
    pub fn execute(self) {
        let run_id = self.aggregate.id().to_string();
        let total = self.case.steps.len();

        // The run only becomes `running` once it owns its execution
        // resource; an acquisition failure goes straight to `failed`.
        let mut session = match self.provider.acquire(self.options.mode) {
            Ok(session) => session,
            Err(e) => {
                error!("{run_id}: session acquisition failed: {e}");
                self.finalize(
                    RunStatus::Failed,
                    Some(format!("could not acquire browser session: {e}")),
                );
                return;
            }
        };

        self.aggregate.with_record(|record| {
            record.status = RunStatus::Running;
            record.started_at = Some(Utc::now());
            record.push_log(
                LogLevel::Info,
                None,
                format!("run started with {total} steps"),
            );
        });
        self.events.notify(&RunEvent::RunStarted {
            run_id: run_id.clone(),
            case: self.case.name.clone(),
            total_steps: total,
        });

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.run_steps(&run_id, session.as_mut())
        }));

        // The session is released no matter how the step loop ended.
        session.close();
        drop(session);

        match outcome {
            Ok(status) => self.finalize(status, None),
            Err(panic) => {
                let message = panic_message(panic);
                error!("{run_id}: internal fault: {message}");
                self.finalize(RunStatus::Failed, Some(format!("internal fault: {message}")));
            }
        }
    }

    /// Walk the steps in order, honoring the stop flag at step boundaries.
    fn run_steps(&self, run_id: &str, session: &mut dyn BrowserSession) -> RunStatus {
        let total = self.case.steps.len();
        let executor = StepExecutor {
            run_id,
            handlers: &self.handlers,
            policy: &self.policy,
            events: self.events.as_ref(),
            default_timeout: self.options.default_timeout,
        };

        let mut any_failed = false;

        for (index, step) in self.case.steps.iter().enumerate() {
            if self.aggregate.control.should_stop() {
                self.aggregate.with_record(|record| {
                    record.push_log(
                        LogLevel::Info,
                        Some(index),
                        format!("stop requested, {} remaining steps not executed", total - index),
                    );
                });
                return RunStatus::Stopped;
            }

            let result = executor.execute(
                step,
                index,
                total,
                &self.aggregate.variables,
                &self.aggregate.control,
                session,
            );
            let status = result.status;
            let step_error = result.error.clone();

            if status == StepStatus::Stopped {
                // The flag landed between the boundary check and the
                // executor's own gate; nothing was executed for this step.
                return RunStatus::Stopped;
            }

            self.aggregate.with_record(|record| record.steps.push(result));

            if status == StepStatus::Failed {
                any_failed = true;
                self.aggregate.with_record(|record| {
                    record.push_log(
                        LogLevel::Error,
                        Some(index),
                        step_error.unwrap_or_else(|| "step failed".to_string()),
                    );
                });
                self.capture_failure_screenshot(run_id, index, session);

                if self.options.stop_on_failure {
                    self.aggregate.with_record(|record| {
                        record.push_log(LogLevel::Info, Some(index), "stopping on first failure");
                    });
                    return RunStatus::Failed;
                }
            }
        }

        if any_failed {
            RunStatus::Failed
        } else {
            RunStatus::Success
        }
    }

    /// Best-effort page capture after a failed step.
    fn capture_failure_screenshot(
        &self,
        run_id: &str,
        index: usize,
        session: &mut dyn BrowserSession,
    ) {
        match session.capture_screenshot() {
            Ok(data) => self.aggregate.with_record(|record| {
                record.screenshots.push(Screenshot {
                    step_index: index,
                    captured_at: Utc::now(),
                    data,
                });
            }),
            Err(message) => {
                warn!("{run_id}: screenshot after step {index} failed: {message}");
                self.aggregate.with_record(|record| {
                    record.push_log(
                        LogLevel::Warn,
                        Some(index),
                        format!("screenshot capture failed: {message}"),
                    );
                });
            }
        }
    }

    /// Settle the run on a terminal status and publish the summary event.
    fn finalize(&self, status: RunStatus, error: Option<String>) {
        let record = self.aggregate.with_record(|record| {
            record.status = status;
            record.ended_at = Some(Utc::now());
            if record.error.is_none() {
                record.error = error;
            }
            record.push_log(LogLevel::Info, None, format!("run finished: {status}"));
            record.clone()
        });

        self.events.notify(&RunEvent::RunFinished {
            run_id: record.id.clone(),
            status,
            succeeded: record.succeeded_steps(),
            failed: record.failed_steps(),
            skipped: record.skipped_steps(),
            duration_ms: record.duration_ms(),
        });
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::capability::{ActionHandler, ActionRequest, HandlerError, HandlerResult};
    use crate::engine::events::CollectingSink;
    use crate::engine::registry::RunId;
    use crate::error::{PilotError, Result};
    use crate::testcase::StepSpec;
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    struct TestSession {
        screenshot: std::result::Result<String, String>,
        closed: Arc<Mutex<u32>>,
    }

    impl BrowserSession for TestSession {
        fn id(&self) -> &str {
            "sess-test"
        }
        fn capture_screenshot(&mut self) -> std::result::Result<String, String> {
            self.screenshot.clone()
        }
        fn close(&mut self) {
            *self.closed.lock() += 1;
        }
    }

    struct TestProvider {
        closed: Arc<Mutex<u32>>,
        screenshot: std::result::Result<String, String>,
        fail_acquire: bool,
    }

    impl TestProvider {
        fn new() -> Self {
            Self {
                closed: Arc::new(Mutex::new(0)),
                screenshot: Ok("aW1hZ2U=".to_string()),
                fail_acquire: false,
            }
        }
    }

    impl SessionProvider for TestProvider {
        fn acquire(&self, _mode: SessionMode) -> Result<Box<dyn BrowserSession>> {
            if self.fail_acquire {
                return Err(PilotError::SessionError {
                    message: "no browser available".into(),
                });
            }
            Ok(Box::new(TestSession {
                screenshot: self.screenshot.clone(),
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    enum Script {
        Ok(Option<Value>),
        Fail(HandlerError),
        Panic,
    }

    struct ScriptedHandler {
        script: Vec<Script>,
        calls: Mutex<usize>,
    }

    impl ScriptedHandler {
        fn new(script: Vec<Script>) -> Self {
            Self {
                script,
                calls: Mutex::new(0),
            }
        }
    }

    impl ActionHandler for ScriptedHandler {
        fn perform(&self, _: &mut dyn BrowserSession, _: &ActionRequest) -> HandlerResult {
            let mut calls = self.calls.lock();
            let index = (*calls).min(self.script.len().saturating_sub(1));
            *calls += 1;
            match &self.script[index] {
                Script::Ok(value) => Ok(value.clone()),
                Script::Fail(error) => Err(error.clone()),
                Script::Panic => panic!("handler blew up"),
            }
        }
    }

    fn tap_step() -> StepSpec {
        StepSpec {
            type_tag: "tap".into(),
            params: json!({"locate": "button"}),
            description: None,
            output_variable: None,
            skip: false,
            timeout_ms: None,
        }
    }

    fn case_of(steps: Vec<StepSpec>) -> TestCase {
        TestCase {
            name: "coordinated".into(),
            description: None,
            steps,
        }
    }

    struct Harness {
        provider: Arc<TestProvider>,
        events: Arc<CollectingSink>,
        aggregate: Arc<RunAggregate>,
    }

    impl Harness {
        fn run(case: TestCase, options: RunOptions, handler: ScriptedHandler) -> Self {
            Self::run_with(case, options, handler, TestProvider::new())
        }

        fn run_with(
            case: TestCase,
            options: RunOptions,
            handler: ScriptedHandler,
            provider: TestProvider,
        ) -> Self {
            let mut handlers = HandlerRegistry::new();
            handlers.register_all(Arc::new(handler));
            let provider = Arc::new(provider);
            let events = Arc::new(CollectingSink::new());
            let aggregate = Arc::new(RunAggregate::new(
                RunId::new(),
                &case.name,
                options.mode,
            ));

            let coordinator = RunCoordinator::new(
                Arc::clone(&aggregate),
                case,
                options,
                Arc::new(handlers),
                RetryPolicy::immediate(3),
                Arc::clone(&provider) as Arc<dyn SessionProvider>,
                Arc::clone(&events) as Arc<dyn EventSink>,
            );
            coordinator.execute();

            Self {
                provider,
                events,
                aggregate,
            }
        }
    }

    #[test]
    fn all_steps_succeeding_yields_success() {
        let harness = Harness::run(
            case_of(vec![tap_step(), tap_step()]),
            RunOptions::default(),
            ScriptedHandler::new(vec![Script::Ok(None)]),
        );

        let record = harness.aggregate.snapshot();
        assert_eq!(record.status, RunStatus::Success);
        assert_eq!(record.steps.len(), 2);
        assert_eq!(*harness.provider.closed.lock(), 1);
    }

    #[test]
    fn failed_step_continues_by_default() {
        let harness = Harness::run(
            case_of(vec![tap_step(), tap_step(), tap_step()]),
            RunOptions::default(),
            ScriptedHandler::new(vec![
                Script::Fail(HandlerError::Failed("element vanished".into())),
                Script::Ok(None),
                Script::Ok(None),
            ]),
        );

        let record = harness.aggregate.snapshot();
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.steps.len(), 3);
        assert_eq!(record.failed_steps(), 1);
        assert_eq!(record.succeeded_steps(), 2);
    }

    #[test]
    fn stop_on_failure_halts_after_failing_step() {
        let harness = Harness::run(
            case_of(vec![tap_step(), tap_step(), tap_step()]),
            RunOptions {
                stop_on_failure: true,
                ..Default::default()
            },
            ScriptedHandler::new(vec![Script::Fail(HandlerError::Failed("nope".into()))]),
        );

        let record = harness.aggregate.snapshot();
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.steps.len(), 1);
        assert_eq!(*harness.provider.closed.lock(), 1);
    }

    #[test]
    fn skipped_steps_do_not_count_against_success() {
        let mut skipped = tap_step();
        skipped.skip = true;
        let harness = Harness::run(
            case_of(vec![tap_step(), skipped]),
            RunOptions::default(),
            ScriptedHandler::new(vec![Script::Ok(None)]),
        );

        let record = harness.aggregate.snapshot();
        assert_eq!(record.status, RunStatus::Success);
        assert_eq!(record.skipped_steps(), 1);
    }

    #[test]
    fn failed_step_captures_screenshot() {
        let harness = Harness::run(
            case_of(vec![tap_step()]),
            RunOptions::default(),
            ScriptedHandler::new(vec![Script::Fail(HandlerError::Failed("gone".into()))]),
        );

        let record = harness.aggregate.snapshot();
        assert_eq!(record.screenshots.len(), 1);
        assert_eq!(record.screenshots[0].step_index, 0);
        assert_eq!(record.screenshots[0].data, "aW1hZ2U=");
    }

    #[test]
    fn screenshot_failure_only_logs() {
        let mut provider = TestProvider::new();
        provider.screenshot = Err("page gone".into());
        let harness = Harness::run_with(
            case_of(vec![tap_step()]),
            RunOptions::default(),
            ScriptedHandler::new(vec![Script::Fail(HandlerError::Failed("gone".into()))]),
            provider,
        );

        let record = harness.aggregate.snapshot();
        assert!(record.screenshots.is_empty());
        assert!(record
            .logs
            .iter()
            .any(|l| l.message.contains("screenshot capture failed")));
    }

    #[test]
    fn session_acquisition_failure_fails_the_run() {
        let mut provider = TestProvider::new();
        provider.fail_acquire = true;
        let harness = Harness::run_with(
            case_of(vec![tap_step()]),
            RunOptions::default(),
            ScriptedHandler::new(vec![Script::Ok(None)]),
            provider,
        );

        let record = harness.aggregate.snapshot();
        assert_eq!(record.status, RunStatus::Failed);
        assert!(record.steps.is_empty());
        assert!(record.error.unwrap().contains("browser session"));
    }

    #[test]
    fn panicking_handler_becomes_a_failed_run_with_session_released() {
        let harness = Harness::run(
            case_of(vec![tap_step()]),
            RunOptions::default(),
            ScriptedHandler::new(vec![Script::Panic]),
        );

        let record = harness.aggregate.snapshot();
        assert_eq!(record.status, RunStatus::Failed);
        assert!(record.error.unwrap().contains("internal fault"));
        assert_eq!(*harness.provider.closed.lock(), 1);
    }

    #[test]
    fn pre_set_stop_flag_executes_nothing() {
        let mut handlers = HandlerRegistry::new();
        handlers.register_all(Arc::new(ScriptedHandler::new(vec![Script::Ok(None)])));
        let provider = Arc::new(TestProvider::new());
        let events = Arc::new(CollectingSink::new());
        let aggregate = Arc::new(RunAggregate::new(RunId::new(), "halted", SessionMode::Headless));
        aggregate.control.request_stop();

        RunCoordinator::new(
            Arc::clone(&aggregate),
            case_of(vec![tap_step(), tap_step()]),
            RunOptions::default(),
            Arc::new(handlers),
            RetryPolicy::immediate(3),
            provider.clone() as Arc<dyn SessionProvider>,
            events as Arc<dyn EventSink>,
        )
        .execute();

        let record = aggregate.snapshot();
        assert_eq!(record.status, RunStatus::Stopped);
        assert!(record.steps.is_empty());
        assert_eq!(*provider.closed.lock(), 1);
    }

    #[test]
    fn lifecycle_events_bracket_the_run() {
        let harness = Harness::run(
            case_of(vec![tap_step()]),
            RunOptions::default(),
            ScriptedHandler::new(vec![Script::Ok(None)]),
        );

        let events = harness.events.collected();
        assert!(matches!(events.first(), Some(RunEvent::RunStarted { .. })));
        assert!(matches!(
            events.last(),
            Some(RunEvent::RunFinished {
                status: RunStatus::Success,
                ..
            })
        ));
    }
}
