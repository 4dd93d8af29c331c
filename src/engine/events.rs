//! Run lifecycle events.
//!
//! The engine reports progress through an [`EventSink`]: one `RunStarted`,
//! then for each executed step a `StepStarted`/`StepFinished` pair (skipped
//! and stopped steps only get `StepFinished`), then one `RunFinished` with
//! aggregate counts. Events within one run arrive in order; events from
//! different runs interleave arbitrarily, so sinks must be safe to call
//! from multiple run threads.

use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use crate::engine::capability::Capability;
use crate::engine::executor::StepStatus;
use crate::engine::registry::RunStatus;

/// A progress event published by the engine.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        case: String,
        total_steps: usize,
    },
    StepStarted {
        run_id: String,
        step_index: usize,
        total_steps: usize,
        capability: Capability,
        description: Option<String>,
    },
    StepFinished {
        run_id: String,
        step_index: usize,
        status: StepStatus,
        duration_ms: u64,
        attempts: u32,
        error: Option<String>,
    },
    RunFinished {
        run_id: String,
        status: RunStatus,
        succeeded: usize,
        failed: usize,
        skipped: usize,
        duration_ms: u64,
    },
}

impl RunEvent {
    /// The run this event belongs to.
    pub fn run_id(&self) -> &str {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::StepStarted { run_id, .. }
            | Self::StepFinished { run_id, .. }
            | Self::RunFinished { run_id, .. } => run_id,
        }
    }
}

/// Receiver for engine progress events.
pub trait EventSink: Send + Sync {
    fn notify(&self, event: &RunEvent);
}

/// Sink that forwards events to the tracing log.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn notify(&self, event: &RunEvent) {
        match event {
            RunEvent::RunStarted {
                run_id,
                case,
                total_steps,
            } => info!("{run_id}: run started for '{case}' ({total_steps} steps)"),
            RunEvent::StepStarted {
                run_id,
                step_index,
                total_steps,
                capability,
                ..
            } => info!("{run_id}: step {}/{total_steps} {capability}", step_index + 1),
            RunEvent::StepFinished {
                run_id,
                step_index,
                status,
                duration_ms,
                error,
                ..
            } => match error {
                Some(error) => {
                    info!("{run_id}: step {} {status} ({duration_ms}ms): {error}", step_index + 1)
                }
                None => info!("{run_id}: step {} {status} ({duration_ms}ms)", step_index + 1),
            },
            RunEvent::RunFinished {
                run_id,
                status,
                succeeded,
                failed,
                skipped,
                duration_ms,
            } => info!(
                "{run_id}: run {status} in {duration_ms}ms \
                 ({succeeded} ok, {failed} failed, {skipped} skipped)"
            ),
        }
    }
}

/// Sink that records every event, for tests and introspection.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<RunEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events received so far, in delivery order.
    pub fn collected(&self) -> Vec<RunEvent> {
        self.events.lock().clone()
    }

    /// Events belonging to one run, in delivery order.
    pub fn for_run(&self, run_id: &str) -> Vec<RunEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.run_id() == run_id)
            .cloned()
            .collect()
    }
}

impl EventSink for CollectingSink {
    fn notify(&self, event: &RunEvent) {
        self.events.lock().push(event.clone());
    }
}
