//! Command-line interface for swe-playground.
//!
//! Provides one subcommand per pipeline stage: project creation, task-plan
//! conversion, rollout, variant generation, image builds and trajectory
//! conversion.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
