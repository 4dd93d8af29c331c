//! Process-wide run registry.
//!
//! The registry is the only state shared across runs. It owns, per run id,
//! one [`RunAggregate`] - the run record, the cancellation flag, and the
//! variable store - behind a single lock-guarded map. Starting a run
//! spawns a dedicated worker thread; stopping, status queries, and
//! variable listings go through the registry from any thread.
//!
//! Retention is bounded: once more than N runs are tracked, the oldest
//! finished runs are dropped first. Runs still executing are never
//! evicted.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::capability::HandlerRegistry;
use crate::engine::coordinator::{RunCoordinator, RunOptions};
use crate::engine::events::EventSink;
use crate::engine::executor::{StepResult, StepStatus};
use crate::engine::retry::RetryPolicy;
use crate::engine::variables::{ReferenceTrace, VariableStore, VariableSummary};
use crate::error::{PilotError, Result};
use crate::session::{SessionMode, SessionProvider};
use crate::testcase::TestCase;

/// Default number of runs kept before eviction.
pub const DEFAULT_RETENTION: usize = 50;

/// A unique run identifier.
///
/// Format: `run_{timestamp_ms}_{random_hex}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId {
    timestamp: DateTime<Utc>,
    random: [u8; 8],
}

impl RunId {
    /// Generate a new run ID.
    pub fn new() -> Self {
        let mut random = [0u8; 8];
        getrandom::getrandom(&mut random).expect("Failed to generate random bytes");

        // Truncate to milliseconds for consistent serialization
        let now = Utc::now();
        let timestamp = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);

        Self { timestamp, random }
    }

    /// When the ID was generated.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Parse a run ID from a string.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix("run_")?;
        let parts: Vec<&str> = s.split('_').collect();
        if parts.len() != 2 {
            return None;
        }

        let ts_millis: i64 = parts[0].parse().ok()?;
        let timestamp = DateTime::from_timestamp_millis(ts_millis)?;
        let random_bytes = hex::decode(parts[1]).ok()?;
        if random_bytes.len() != 8 {
            return None;
        }

        let mut random = [0u8; 8];
        random.copy_from_slice(&random_bytes);

        Some(Self { timestamp, random })
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_{}_{}",
            self.timestamp.timestamp_millis(),
            hex::encode(self.random)
        )
    }
}

impl Serialize for RunId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RunId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RunId::parse(&s).ok_or_else(|| serde::de::Error::custom("Invalid run ID format"))
    }
}

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Created, worker not yet executing steps.
    Pending,
    /// Steps are executing.
    Running,
    /// All executed steps succeeded (skipped steps do not count against).
    Success,
    /// At least one step failed, or the run hit an internal fault.
    Failed,
    /// A stop request took effect before the last step.
    Stopped,
}

impl RunStatus {
    /// Whether no further transitions can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Stopped)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Severity of a run log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One entry in a run's ordered log.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    /// Step the entry relates to, when step-specific.
    pub step: Option<usize>,
    pub message: String,
}

/// A screenshot captured during a run.
#[derive(Debug, Clone, Serialize)]
pub struct Screenshot {
    pub step_index: usize,
    pub captured_at: DateTime<Utc>,
    /// Base64-encoded image data.
    pub data: String,
}

/// Full record of one run. Mutated only by the run's own worker; cloned
/// out as a read-only snapshot for everyone else.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: String,
    pub case_name: String,
    pub mode: SessionMode,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepResult>,
    pub logs: Vec<LogEntry>,
    pub screenshots: Vec<Screenshot>,
    /// Run-level failure, e.g. session acquisition or an internal fault.
    pub error: Option<String>,
}

impl RunRecord {
    fn new(id: &RunId, case_name: &str, mode: SessionMode) -> Self {
        Self {
            id: id.to_string(),
            case_name: case_name.to_string(),
            mode,
            status: RunStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            steps: Vec::new(),
            logs: Vec::new(),
            screenshots: Vec::new(),
            error: None,
        }
    }

    pub fn succeeded_steps(&self) -> usize {
        self.count(StepStatus::Success)
    }

    pub fn failed_steps(&self) -> usize {
        self.count(StepStatus::Failed)
    }

    pub fn skipped_steps(&self) -> usize {
        self.count(StepStatus::Skipped)
    }

    fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    /// Wall-clock duration, zero while the run is still going.
    pub fn duration_ms(&self) -> u64 {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => {
                end.signed_duration_since(start).num_milliseconds().max(0) as u64
            }
            _ => 0,
        }
    }

    /// Append a log entry.
    pub fn push_log(&mut self, level: LogLevel, step: Option<usize>, message: impl Into<String>) {
        self.logs.push(LogEntry {
            at: Utc::now(),
            level,
            step,
            message: message.into(),
        });
    }
}

/// Cooperative cancellation flag, part of the run aggregate.
#[derive(Debug, Default)]
pub struct RunControl {
    should_stop: AtomicBool,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop at the next step boundary.
    pub fn request_stop(&self) {
        self.should_stop.store(true, Ordering::SeqCst);
    }

    pub fn should_stop(&self) -> bool {
        self.should_stop.load(Ordering::SeqCst)
    }
}

/// Everything the process tracks for one run: record, cancellation flag,
/// and variable store, owned together so they cannot drift apart.
pub struct RunAggregate {
    id: RunId,
    record: RwLock<RunRecord>,
    pub control: RunControl,
    pub variables: VariableStore,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RunAggregate {
    pub fn new(id: RunId, case_name: &str, mode: SessionMode) -> Self {
        let record = RunRecord::new(&id, case_name, mode);
        Self {
            id,
            record: RwLock::new(record),
            control: RunControl::new(),
            variables: VariableStore::new(),
            worker: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &RunId {
        &self.id
    }

    /// Read-only snapshot of the current record.
    pub fn snapshot(&self) -> RunRecord {
        self.record.read().clone()
    }

    /// Current status without cloning the whole record.
    pub fn status(&self) -> RunStatus {
        self.record.read().status
    }

    /// Mutate the record. Only the run's own worker should call this.
    pub(crate) fn with_record<R>(&self, f: impl FnOnce(&mut RunRecord) -> R) -> R {
        f(&mut self.record.write())
    }

    /// Condensed row for listings.
    pub fn summary(&self) -> RunSummary {
        let record = self.record.read();
        RunSummary {
            id: record.id.clone(),
            case_name: record.case_name.clone(),
            status: record.status,
            succeeded: record.succeeded_steps(),
            failed: record.failed_steps(),
            skipped: record.skipped_steps(),
            duration_ms: record.duration_ms(),
            started_at: record.started_at,
        }
    }
}

impl fmt::Debug for RunAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunAggregate")
            .field("id", &self.id.to_string())
            .field("status", &self.status())
            .finish()
    }
}

/// Condensed run row for listings.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub id: String,
    pub case_name: String,
    pub status: RunStatus,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub started_at: Option<DateTime<Utc>>,
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The flag was set; the run stops at the next step boundary.
    Requested,
    /// The run had already reached a terminal status.
    AlreadyFinished(RunStatus),
    /// No run with that id is tracked.
    UnknownRun,
}

impl StopOutcome {
    pub fn accepted(&self) -> bool {
        matches!(self, Self::Requested)
    }
}

#[derive(Default)]
struct RegistryInner {
    runs: HashMap<String, Arc<RunAggregate>>,
    /// Insertion order, oldest first. Drives eviction.
    order: Vec<String>,
}

/// Process-wide map of runs, with bounded retention.
pub struct RunRegistry {
    inner: RwLock<RegistryInner>,
    retention: usize,
    handlers: Arc<HandlerRegistry>,
    provider: Arc<dyn SessionProvider>,
    events: Arc<dyn EventSink>,
    policy: RetryPolicy,
}

impl RunRegistry {
    pub fn new(
        handlers: Arc<HandlerRegistry>,
        provider: Arc<dyn SessionProvider>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            retention: DEFAULT_RETENTION,
            handlers,
            provider,
            events,
            policy: RetryPolicy::default(),
        }
    }

    /// Override how many runs are kept before eviction.
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    /// Override the retry policy applied to every run.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Start a run. Returns immediately; steps execute on a dedicated
    /// worker thread.
    pub fn start_run(&self, case: TestCase, options: RunOptions) -> Result<RunId> {
        let id = RunId::new();
        let aggregate = Arc::new(RunAggregate::new(id.clone(), &case.name, options.mode));

        {
            let mut inner = self.inner.write();
            inner.runs.insert(id.to_string(), Arc::clone(&aggregate));
            inner.order.push(id.to_string());
            Self::evict_locked(&mut inner, self.retention);
        }

        let coordinator = RunCoordinator::new(
            Arc::clone(&aggregate),
            case,
            options,
            Arc::clone(&self.handlers),
            self.policy.clone(),
            Arc::clone(&self.provider),
            Arc::clone(&self.events),
        );

        let spawn_result = std::thread::Builder::new()
            .name(format!("{id}"))
            .spawn(move || coordinator.execute());

        match spawn_result {
            Ok(handle) => {
                *aggregate.worker.lock() = Some(handle);
                debug!("{id}: worker launched");
                Ok(id)
            }
            Err(e) => {
                let mut inner = self.inner.write();
                inner.runs.remove(&id.to_string());
                inner.order.retain(|o| o != &id.to_string());
                Err(PilotError::RunLaunchError {
                    run_id: id.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Request cooperative cancellation of a run. Best effort: an in-flight
    /// step finishes before the flag is observed.
    pub fn request_stop(&self, run_id: &str) -> StopOutcome {
        let Some(aggregate) = self.get(run_id) else {
            return StopOutcome::UnknownRun;
        };
        let status = aggregate.status();
        if status.is_terminal() {
            return StopOutcome::AlreadyFinished(status);
        }
        aggregate.control.request_stop();
        StopOutcome::Requested
    }

    /// Snapshot of a run's record.
    pub fn get_status(&self, run_id: &str) -> Option<RunRecord> {
        self.get(run_id).map(|a| a.snapshot())
    }

    /// Variable summaries for a run, ordered by producing step.
    pub fn list_variables(&self, run_id: &str) -> Option<Vec<VariableSummary>> {
        self.get(run_id).map(|a| a.variables.summaries())
    }

    /// The run's reference trace: every `${...}` expression the resolver
    /// touched, with its outcome.
    pub fn reference_trace(&self, run_id: &str) -> Option<Vec<ReferenceTrace>> {
        self.get(run_id).map(|a| a.variables.trace())
    }

    /// Summaries of tracked runs, most recent first.
    pub fn list_runs(&self) -> Vec<RunSummary> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.runs.get(id))
            .map(|a| a.summary())
            .collect()
    }

    /// Block until a run's worker finishes, then return its final record.
    pub fn wait(&self, run_id: &str) -> Option<RunRecord> {
        let aggregate = self.get(run_id)?;
        let handle = aggregate.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        Some(aggregate.snapshot())
    }

    /// Number of tracked runs.
    pub fn len(&self) -> usize {
        self.inner.read().runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, run_id: &str) -> Option<Arc<RunAggregate>> {
        self.inner.read().runs.get(run_id).cloned()
    }

    /// Drop the oldest finished runs until the map fits the retention
    /// bound. Runs still executing are kept regardless.
    fn evict_locked(inner: &mut RegistryInner, retention: usize) {
        while inner.runs.len() > retention {
            let evictable = inner
                .order
                .iter()
                .position(|id| {
                    inner
                        .runs
                        .get(id)
                        .is_some_and(|a| a.status().is_terminal())
                })
                .map(|pos| inner.order[pos].clone());

            match evictable {
                Some(id) => {
                    inner.runs.remove(&id);
                    inner.order.retain(|o| o != &id);
                    debug!("{id}: evicted from registry");
                }
                None => break,
            }
        }
    }
}

impl fmt::Debug for RunRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunRegistry")
            .field("runs", &self.len())
            .field("retention", &self.retention)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::capability::{
        ActionHandler, ActionRequest, Capability, HandlerResult,
    };
    use crate::engine::events::CollectingSink;
    use crate::session::BrowserSession;
    use crate::testcase::StepSpec;
    use serde_json::json;
    use std::sync::mpsc::{channel, Sender};

    struct TestSession;

    impl BrowserSession for TestSession {
        fn id(&self) -> &str {
            "sess-test"
        }
        fn capture_screenshot(&mut self) -> std::result::Result<String, String> {
            Ok("aW1hZ2U=".to_string())
        }
        fn close(&mut self) {}
    }

    struct TestProvider;

    impl SessionProvider for TestProvider {
        fn acquire(&self, _mode: SessionMode) -> Result<Box<dyn BrowserSession>> {
            Ok(Box::new(TestSession))
        }
    }

    struct InstantHandler;

    impl ActionHandler for InstantHandler {
        fn perform(&self, _: &mut dyn BrowserSession, _: &ActionRequest) -> HandlerResult {
            Ok(None)
        }
    }

    /// Blocks until the test releases it through the channel.
    struct GatedHandler {
        gate: parking_lot::Mutex<std::sync::mpsc::Receiver<()>>,
        started: Sender<()>,
    }

    impl ActionHandler for GatedHandler {
        fn perform(&self, _: &mut dyn BrowserSession, _: &ActionRequest) -> HandlerResult {
            let _ = self.started.send(());
            let _ = self.gate.lock().recv();
            Ok(None)
        }
    }

    fn tap_case(name: &str, steps: usize) -> TestCase {
        TestCase {
            name: name.into(),
            description: None,
            steps: (0..steps)
                .map(|_| StepSpec {
                    type_tag: "tap".into(),
                    params: json!({"locate": "button"}),
                    description: None,
                    output_variable: None,
                    skip: false,
                    timeout_ms: None,
                })
                .collect(),
        }
    }

    fn registry() -> RunRegistry {
        let mut handlers = HandlerRegistry::new();
        handlers.register_all(Arc::new(InstantHandler));
        RunRegistry::new(
            Arc::new(handlers),
            Arc::new(TestProvider),
            Arc::new(CollectingSink::new()),
        )
        .with_policy(RetryPolicy::immediate(3))
    }

    #[test]
    fn run_id_round_trips() {
        let id = RunId::new();
        assert!(id.to_string().starts_with("run_"));
        assert_eq!(RunId::parse(&id.to_string()), Some(id.clone()));

        let json = serde_json::to_string(&id).unwrap();
        let parsed: RunId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn run_id_parse_rejects_malformed() {
        assert!(RunId::parse("invalid").is_none());
        assert!(RunId::parse("run_").is_none());
        assert!(RunId::parse("run_123").is_none());
        assert!(RunId::parse("run_abc_xyz").is_none());
    }

    #[test]
    fn run_status_terminality() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Success.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Stopped.is_terminal());
    }

    #[test]
    fn start_run_completes_and_reports_success() {
        let registry = registry();
        let id = registry.start_run(tap_case("smoke", 2), RunOptions::default()).unwrap();

        let record = registry.wait(&id.to_string()).unwrap();
        assert_eq!(record.status, RunStatus::Success);
        assert_eq!(record.steps.len(), 2);
        assert_eq!(record.succeeded_steps(), 2);
        assert!(record.started_at.is_some());
        assert!(record.ended_at.is_some());
    }

    #[test]
    fn get_status_unknown_run_is_none() {
        let registry = registry();
        assert!(registry.get_status("run_0_0000000000000000").is_none());
    }

    #[test]
    fn stop_unknown_run_is_a_noop() {
        let registry = registry();
        assert_eq!(registry.request_stop("run_0_ffff"), StopOutcome::UnknownRun);
    }

    #[test]
    fn stop_finished_run_reports_terminal_status() {
        let registry = registry();
        let id = registry.start_run(tap_case("done", 1), RunOptions::default()).unwrap();
        registry.wait(&id.to_string());

        let outcome = registry.request_stop(&id.to_string());
        assert_eq!(outcome, StopOutcome::AlreadyFinished(RunStatus::Success));
        assert!(!outcome.accepted());
    }

    #[test]
    fn stop_running_run_is_accepted() {
        let (release_tx, release_rx) = channel();
        let (started_tx, started_rx) = channel();
        let mut handlers = HandlerRegistry::new();
        handlers.register_all(Arc::new(GatedHandler {
            gate: parking_lot::Mutex::new(release_rx),
            started: started_tx,
        }));
        let registry = RunRegistry::new(
            Arc::new(handlers),
            Arc::new(TestProvider),
            Arc::new(CollectingSink::new()),
        );

        let id = registry.start_run(tap_case("gated", 3), RunOptions::default()).unwrap();
        started_rx.recv().unwrap();

        let outcome = registry.request_stop(&id.to_string());
        assert!(outcome.accepted());

        // Release the in-flight step; remaining steps must not run.
        drop(release_tx);
        let record = registry.wait(&id.to_string()).unwrap();
        assert_eq!(record.status, RunStatus::Stopped);
        assert_eq!(record.steps.len(), 1);
    }

    #[test]
    fn retention_evicts_oldest_finished_runs() {
        let registry = registry().with_retention(2);

        let first = registry.start_run(tap_case("first", 1), RunOptions::default()).unwrap();
        registry.wait(&first.to_string());
        let second = registry.start_run(tap_case("second", 1), RunOptions::default()).unwrap();
        registry.wait(&second.to_string());
        let third = registry.start_run(tap_case("third", 1), RunOptions::default()).unwrap();
        registry.wait(&third.to_string());

        assert_eq!(registry.len(), 2);
        assert!(registry.get_status(&first.to_string()).is_none());
        assert!(registry.get_status(&second.to_string()).is_some());
        assert!(registry.get_status(&third.to_string()).is_some());
    }

    #[test]
    fn retention_never_evicts_active_runs() {
        let (release_tx, release_rx) = channel();
        let (started_tx, started_rx) = channel();
        let mut handlers = HandlerRegistry::new();
        handlers.register_all(Arc::new(GatedHandler {
            gate: parking_lot::Mutex::new(release_rx),
            started: started_tx,
        }));
        let registry = RunRegistry::new(
            Arc::new(handlers),
            Arc::new(TestProvider),
            Arc::new(CollectingSink::new()),
        )
        .with_retention(1);

        let active = registry.start_run(tap_case("active", 1), RunOptions::default()).unwrap();
        started_rx.recv().unwrap();

        // Inserting more runs than the bound cannot displace the one
        // still executing.
        let other = registry.start_run(tap_case("other", 1), RunOptions::default()).unwrap();
        assert!(registry.get_status(&active.to_string()).is_some());

        drop(release_tx);
        registry.wait(&active.to_string());
        registry.wait(&other.to_string());
    }

    #[test]
    fn list_runs_is_most_recent_first() {
        let registry = registry();
        let first = registry.start_run(tap_case("one", 1), RunOptions::default()).unwrap();
        registry.wait(&first.to_string());
        let second = registry.start_run(tap_case("two", 1), RunOptions::default()).unwrap();
        registry.wait(&second.to_string());

        let runs = registry.list_runs();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].case_name, "two");
        assert_eq!(runs[1].case_name, "one");
    }

    #[test]
    fn concurrent_runs_have_isolated_variables() {
        struct NamedValueHandler;

        impl ActionHandler for NamedValueHandler {
            fn perform(
                &self,
                _: &mut dyn BrowserSession,
                request: &ActionRequest,
            ) -> HandlerResult {
                Ok(Some(request.params.get("prompt").cloned().unwrap_or_default()))
            }
        }

        let mut handlers = HandlerRegistry::new();
        handlers.register_all(Arc::new(NamedValueHandler));
        let registry = RunRegistry::new(
            Arc::new(handlers),
            Arc::new(TestProvider),
            Arc::new(CollectingSink::new()),
        );

        let case = |name: &str, prompt: &str| TestCase {
            name: name.into(),
            description: None,
            steps: vec![StepSpec {
                type_tag: "aiQuery".into(),
                params: json!({"prompt": prompt}),
                description: None,
                output_variable: Some("value".into()),
                skip: false,
                timeout_ms: None,
            }],
        };

        let a = registry.start_run(case("a", "alpha"), RunOptions::default()).unwrap();
        let b = registry.start_run(case("b", "beta"), RunOptions::default()).unwrap();
        registry.wait(&a.to_string());
        registry.wait(&b.to_string());

        let vars_a = registry.list_variables(&a.to_string()).unwrap();
        let vars_b = registry.list_variables(&b.to_string()).unwrap();
        assert_eq!(vars_a[0].preview, "alpha");
        assert_eq!(vars_b[0].preview, "beta");
    }
}
