//! swe-playground: synthetic software-engineering benchmark generator.
//!
//! This library proposes software projects with an LLM, rolls them out task
//! by task with an external coding agent under an ever-growing unit-test
//! suite, and derives SWE-bench, SWT-Bench and Commit-0 style variants from
//! the accepted checkpoints.

// Core modules
pub mod agent;
pub mod cli;
pub mod config;
pub mod docker;
pub mod error;
pub mod llm;
pub mod manifest;
pub mod prompts;
pub mod propose;
pub mod rollout;
pub mod synth;
pub mod trajectory;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used error types
pub use error::{
    AgentError, DockerError, LlmError, ManifestError, ProposeError, RolloutError, SynthError,
    TestRunError, TrajectoryError,
};
