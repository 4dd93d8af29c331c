//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// AI-assisted browser test case orchestration.
#[derive(Debug, Parser)]
#[command(name = "pilot", version, about)]
pub struct Cli {
    /// Enable debug logging.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Suppress progress output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Execute a test case.
    Run(RunArgs),

    /// Statically check a test case without touching a browser.
    Lint(LintArgs),

    /// List canonical action types and their accepted aliases.
    Capabilities,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to the test case YAML file.
    pub case: PathBuf,

    /// Automation sidecar endpoint, e.g. http://127.0.0.1:4173.
    #[arg(long, env = "PILOT_BRIDGE_URL")]
    pub bridge: Option<String>,

    /// Show the browser window instead of running headless.
    #[arg(long)]
    pub headed: bool,

    /// End the run at the first failed step.
    #[arg(long)]
    pub stop_on_failure: bool,

    /// Resolve the plan and print it without executing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Default per-step handler timeout in milliseconds.
    #[arg(long, default_value_t = 30_000)]
    pub timeout_ms: u64,
}

#[derive(Debug, Args)]
pub struct LintArgs {
    /// Path to the test case YAML file.
    pub case: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_args_parse_flags() {
        let cli = Cli::parse_from([
            "pilot",
            "run",
            "case.yml",
            "--headed",
            "--stop-on-failure",
            "--timeout-ms",
            "5000",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert!(args.headed);
        assert!(args.stop_on_failure);
        assert_eq!(args.timeout_ms, 5000);
        assert!(!args.dry_run);
    }

    #[test]
    fn lint_command_parses() {
        let cli = Cli::parse_from(["pilot", "lint", "case.yml"]);
        assert!(matches!(cli.command, Commands::Lint(_)));
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = Cli::parse_from(["pilot", "capabilities", "--debug"]);
        assert!(cli.debug);
    }
}
