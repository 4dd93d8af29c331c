//! Command implementations.

use std::sync::Arc;
use std::time::Duration;

use console::style;

use crate::bridge::{BridgeConfig, BridgeHandler, BridgeProvider};
use crate::cli::args::{LintArgs, RunArgs};
use crate::cli::output::ConsoleSink;
use crate::cli::{Cli, Commands};
use crate::engine::capability::{Capability, HandlerRegistry};
use crate::engine::coordinator::RunOptions;
use crate::engine::events::{EventSink, LogSink};
use crate::engine::registry::{RunRegistry, RunStatus};
use crate::error::{PilotError, Result};
use crate::session::SessionMode;
use crate::testcase::lint::{has_errors, LintSeverity};
use crate::testcase::{lint_case, load_case, TestCase};

/// Outcome of a command, carried back to the process exit code.
#[derive(Debug)]
pub struct CommandResult {
    pub exit_code: i32,
}

impl CommandResult {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn failed() -> Self {
        Self { exit_code: 1 }
    }
}

/// Dispatch the parsed CLI to its command.
pub fn dispatch(cli: &Cli) -> Result<CommandResult> {
    match &cli.command {
        Commands::Run(args) => run(args, cli.quiet),
        Commands::Lint(args) => lint(args),
        Commands::Capabilities => capabilities(),
    }
}

fn run(args: &RunArgs, quiet: bool) -> Result<CommandResult> {
    let case = load_case(&args.case)?;

    if args.dry_run {
        print_plan(&case);
        return Ok(CommandResult::ok());
    }

    let endpoint = args.bridge.clone().ok_or_else(|| PilotError::BridgeConfigError {
        message: "no sidecar endpoint configured; pass --bridge or set PILOT_BRIDGE_URL"
            .to_string(),
    })?;
    let config = BridgeConfig::new(endpoint)?;

    let mut handlers = HandlerRegistry::new();
    handlers.register_all(Arc::new(BridgeHandler::new(config.clone())));

    let events: Arc<dyn EventSink> = if quiet {
        Arc::new(LogSink)
    } else {
        Arc::new(ConsoleSink::new())
    };

    let registry = RunRegistry::new(
        Arc::new(handlers),
        Arc::new(BridgeProvider::new(config)),
        events,
    );

    let options = RunOptions {
        mode: if args.headed {
            SessionMode::Headed
        } else {
            SessionMode::Headless
        },
        stop_on_failure: args.stop_on_failure,
        default_timeout: Duration::from_millis(args.timeout_ms),
    };

    let id = registry.start_run(case, options)?;
    let record = registry
        .wait(&id.to_string())
        .ok_or_else(|| PilotError::UnknownRun {
            run_id: id.to_string(),
        })?;

    if !quiet {
        if let Some(variables) = registry.list_variables(&id.to_string()) {
            if !variables.is_empty() {
                println!("\nVariables:");
                for variable in variables {
                    println!(
                        "  {} = {} ({}, step {})",
                        style(&variable.name).bold(),
                        variable.preview,
                        variable.var_type.as_str(),
                        variable.source_step + 1
                    );
                }
            }
        }
        if let Some(error) = &record.error {
            eprintln!("{} {}", style("error:").red().bold(), error);
        }
    }

    if record.status == RunStatus::Success {
        Ok(CommandResult::ok())
    } else {
        Ok(CommandResult::failed())
    }
}

fn print_plan(case: &TestCase) {
    println!("{} ({} steps)", style(&case.name).bold(), case.steps.len());
    for (index, step) in case.steps.iter().enumerate() {
        let capability = Capability::normalize(&step.type_tag)
            .map(|c| c.as_str())
            .unwrap_or("unknown");
        let marker = if step.skip { "⊘" } else { "○" };
        let params = serde_json::to_string(&step.effective_params()).unwrap_or_default();
        match &step.description {
            Some(description) => {
                println!("  {marker} [{}] {capability}: {description} {params}", index + 1)
            }
            None => println!("  {marker} [{}] {capability} {params}", index + 1),
        }
    }
}

fn lint(args: &LintArgs) -> Result<CommandResult> {
    let case = load_case(&args.case)?;
    let findings = lint_case(&case);

    if findings.is_empty() {
        println!("{} {} looks good", style("✓").green(), case.name);
        return Ok(CommandResult::ok());
    }

    for finding in &findings {
        let badge = match finding.severity {
            LintSeverity::Error => style("error").red().bold(),
            LintSeverity::Warning => style("warning").yellow().bold(),
        };
        match finding.step {
            Some(step) => println!("{badge} step {}: {}", step + 1, finding.message),
            None => println!("{badge}: {}", finding.message),
        }
    }

    if has_errors(&findings) {
        Ok(CommandResult::failed())
    } else {
        Ok(CommandResult::ok())
    }
}

fn capabilities() -> Result<CommandResult> {
    for capability in Capability::all() {
        let aliases = capability.aliases();
        if aliases.is_empty() {
            println!("{}", style(capability.as_str()).bold());
        } else {
            println!(
                "{} ({})",
                style(capability.as_str()).bold(),
                aliases.join(", ")
            );
        }
    }
    Ok(CommandResult::ok())
}
