//! Console rendering of run progress.

use console::style;

use crate::engine::events::{EventSink, RunEvent};
use crate::engine::executor::StepStatus;
use crate::engine::registry::RunStatus;

/// Event sink that prints one line per lifecycle event.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for ConsoleSink {
    fn notify(&self, event: &RunEvent) {
        match event {
            RunEvent::RunStarted {
                case, total_steps, ..
            } => {
                println!("{} {} ({} steps)", style("▶").cyan(), style(case).bold(), total_steps);
            }
            RunEvent::StepStarted {
                step_index,
                total_steps,
                capability,
                description,
                ..
            } => {
                let label = description.as_deref().unwrap_or(capability.as_str());
                println!(
                    "  {} [{}/{}] {}",
                    style("◉").cyan(),
                    step_index + 1,
                    total_steps,
                    label
                );
            }
            RunEvent::StepFinished {
                step_index,
                status,
                duration_ms,
                attempts,
                error,
                ..
            } => match status {
                StepStatus::Success => {
                    let retries = if *attempts > 1 {
                        format!(", {attempts} attempts")
                    } else {
                        String::new()
                    };
                    println!(
                        "  {} [{}] done ({duration_ms}ms{retries})",
                        style("✓").green(),
                        step_index + 1
                    );
                }
                StepStatus::Failed => println!(
                    "  {} [{}] {}",
                    style("✗").red(),
                    step_index + 1,
                    error.as_deref().unwrap_or("failed")
                ),
                StepStatus::Skipped => {
                    println!("  {} [{}] skipped", style("⊘").yellow(), step_index + 1)
                }
                StepStatus::Stopped => {
                    println!("  {} [{}] stopped", style("■").yellow(), step_index + 1)
                }
            },
            RunEvent::RunFinished {
                status,
                succeeded,
                failed,
                skipped,
                duration_ms,
                ..
            } => {
                let badge = match status {
                    RunStatus::Success => style("success").green().bold(),
                    RunStatus::Failed => style("failed").red().bold(),
                    RunStatus::Stopped => style("stopped").yellow().bold(),
                    _ => style("finished").bold(),
                };
                println!(
                    "{badge} in {duration_ms}ms ({succeeded} ok, {failed} failed, {skipped} skipped)"
                );
            }
        }
    }
}
