//! Error types for swe-playground operations.
//!
//! Defines error types for all major subsystems:
//! - Task manifest parsing and persistence
//! - LLM API interactions and tagged-response extraction
//! - External coding agent invocation
//! - Prompt rendering
//! - Test execution against checkpoints
//! - Per-task rollout and benchmark-variant synthesis
//! - Trajectory conversion
//! - Container image builds

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while loading or parsing a task manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Manifest file '{}' does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API base URL: OPENAI_BASE_URL or LITELLM_API_BASE environment variable not set")]
    MissingApiBase,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("LLM response missing required <{tag}> tag")]
    MissingTag { tag: String },

    #[error("LLM response left <{tag}> unclosed even after continuation")]
    Truncated { tag: String },

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),
}

/// Errors that can occur while rendering prompt templates.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt template '{0}' not found")]
    NotFound(String),

    #[error("Prompts directory '{}' does not exist", .0.display())]
    MissingDirectory(PathBuf),

    #[error("Tera template rendering error: {0}")]
    Tera(#[from] tera::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while driving the external coding agent.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent is not configured: {0}")]
    NotConfigured(String),

    #[error("Failed to spawn agent '{command}': {reason}")]
    Spawn { command: String, reason: String },

    #[error("Agent exited with code {code}: {stderr}")]
    Failed { code: i32, stderr: String },

    #[error("Agent timed out after {0:?}")]
    Timeout(Duration),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while executing task tests.
///
/// A failing test is not an error; these variants describe a checkpoint
/// that cannot be tested at all.
#[derive(Debug, Error)]
pub enum TestRunError {
    #[error("Test artifact for task {task} does not exist: {}", .path.display())]
    MissingArtifact { task: String, path: PathBuf },

    #[error("Tests directory '{}' does not exist", .0.display())]
    MissingTestsDir(PathBuf),

    #[error("No Python test files found in '{}'", .0.display())]
    NoTestFiles(PathBuf),

    #[error("Failed to launch test command '{command}': {reason}")]
    Launch { command: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during trajectory conversion.
#[derive(Debug, Error)]
pub enum TrajectoryError {
    #[error("No completion log matching 'default-<N.N>.json' found in '{}'", .0.display())]
    NoCompletionLog(PathBuf),

    #[error("Malformed completion log '{}': {reason}", .path.display())]
    MalformedLog { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur during the per-task rollout.
#[derive(Debug, Error)]
pub enum RolloutError {
    #[error("Task {task} failed after {attempts} attempts; rollout halted with {completed} tasks finished")]
    RetriesExhausted {
        task: String,
        attempts: u32,
        completed: usize,
    },

    #[error("Test directory '{}' is missing from the unit-test checkpoint", .0.display())]
    MissingTestsCheckpoint(PathBuf),

    #[error("Test execution error: {0}")]
    Tests(#[from] TestRunError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Trajectory error: {0}")]
    Trajectory(#[from] TrajectoryError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while synthesizing benchmark variants.
#[derive(Debug, Error)]
pub enum SynthError {
    #[error("Required artifact does not exist: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("Test execution error: {0}")]
    Tests(#[from] TestRunError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Trajectory error: {0}")]
    Trajectory(#[from] TrajectoryError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during project proposal and repository setup.
#[derive(Debug, Error)]
pub enum ProposeError {
    #[error("LLM returned no parsable project proposals")]
    NoProposals,

    #[error("Project directory already exists: {}", .0.display())]
    ProjectExists(PathBuf),

    #[error("Starter template directory does not exist: {}", .0.display())]
    MissingStarter(PathBuf),

    #[error("Unsupported programming language: {0}")]
    UnsupportedLanguage(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Docker error: {0}")]
    Docker(#[from] DockerError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur during Docker operations.
#[derive(Debug, Error)]
pub enum DockerError {
    #[error("Dockerfile not found: {}", .0.display())]
    MissingDockerfile(PathBuf),

    #[error("Docker build failed after {attempts} attempts: {tail}")]
    BuildFailed { attempts: u32, tail: String },

    #[error("Failed to run docker: {0}")]
    Command(String),

    #[error("Manifest has no {0}; set up the repository first")]
    MissingProjectField(&'static str),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
