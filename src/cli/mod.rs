//! Command-line interface for Pilot.
//!
//! - [`args`] - argument definitions using clap derive macros
//! - [`commands`] - command implementations
//! - [`output`] - console progress rendering for run events

pub mod args;
pub mod commands;
pub mod output;

pub use args::{Cli, Commands, LintArgs, RunArgs};
pub use commands::{dispatch, CommandResult};
pub use output::ConsoleSink;
