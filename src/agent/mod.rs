//! External coding agent.
//!
//! The agent receives a prompt and a working directory, mutates files in
//! that directory and optionally writes log artifacts (including the
//! `log_completions/` folder read by the trajectory converter) under an
//! output directory. Pipeline stages only see the [`CodingAgent`] trait;
//! [`OpenHandsAgent`] is the production implementation.

pub mod openhands;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AgentError;

pub use openhands::OpenHandsAgent;

/// One agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    pub prompt: String,
    /// Directory the agent is allowed to modify.
    pub working_dir: PathBuf,
    /// Where logs and completion artifacts are written, if anywhere.
    pub output_dir: Option<PathBuf>,
}

impl AgentRequest {
    pub fn new(prompt: impl Into<String>, working_dir: impl AsRef<Path>) -> Self {
        Self {
            prompt: prompt.into(),
            working_dir: working_dir.as_ref().to_path_buf(),
            output_dir: None,
        }
    }

    pub fn with_output_dir(mut self, output_dir: impl AsRef<Path>) -> Self {
        self.output_dir = Some(output_dir.as_ref().to_path_buf());
        self
    }
}

/// What the agent printed while it ran.
#[derive(Debug, Clone, Default)]
pub struct AgentTranscript {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl AgentTranscript {
    pub fn new(exit_code: i32, stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            duration,
        }
    }
}

/// A long-running agent with filesystem side effects.
///
/// Any error means the working directory may be half-written; callers are
/// responsible for removing it.
#[async_trait]
pub trait CodingAgent: Send + Sync {
    async fn run(&self, request: &AgentRequest) -> Result<AgentTranscript, AgentError>;
}
