//! Test execution against project checkpoints.
//!
//! A failing test is an ordinary [`TestOutcome`]; only a checkpoint that
//! cannot be tested at all (missing runner script, missing tests directory)
//! is a [`TestRunError`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::checkpoint::{runner_script, TESTS_DIR};
use crate::config::PipelineConfig;
use crate::error::TestRunError;
use crate::utils::tail_chars;

/// Characters of test output kept in a failure outcome.
const OUTPUT_TAIL: usize = 2000;

/// Result of running one or more tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    Failed {
        /// Task number or test file that failed first.
        target: String,
        output: String,
    },
}

impl TestOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, TestOutcome::Passed)
    }

    pub fn failed(target: impl Into<String>, output: impl Into<String>) -> Self {
        TestOutcome::Failed {
            target: target.into(),
            output: output.into(),
        }
    }
}

/// Runs task tests inside a project directory.
#[async_trait]
pub trait TestExecutor: Send + Sync {
    /// Runs `tests/<task>.sh` for every task in order, stopping at the first
    /// failure. A missing runner script is an error, not a failure.
    async fn run_task_tests(
        &self,
        project_dir: &Path,
        tasks: &[String],
    ) -> Result<TestOutcome, TestRunError>;

    /// Runs every auto-discovered Python test file under `tests/`.
    ///
    /// Files whose names start with `test_` or `__` are not discovered.
    async fn run_suite(&self, project_dir: &Path) -> Result<TestOutcome, TestRunError>;
}

/// Executes tests as subprocesses: `bash tests/<task>.sh` and
/// `python -m pytest <file> -v`, both from the project directory.
#[derive(Debug, Clone)]
pub struct ScriptTestExecutor {
    shell: String,
    python: String,
    timeout: Option<Duration>,
}

impl Default for ScriptTestExecutor {
    fn default() -> Self {
        Self {
            shell: "bash".to_string(),
            python: "python".to_string(),
            timeout: None,
        }
    }
}

impl ScriptTestExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the configured shell and Python interpreter.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new()
            .with_shell(&config.test_shell)
            .with_python(&config.python)
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs a command and reports whether it exited successfully, with the
    /// tail of its combined output.
    async fn run_command(
        &self,
        program: &str,
        args: &[&str],
        cwd: &Path,
    ) -> Result<(bool, String), TestRunError> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let launch_error = |reason: String| TestRunError::Launch {
            command: format!("{} {}", program, args.join(" ")),
            reason,
        };

        let child = cmd.spawn().map_err(|e| launch_error(e.to_string()))?;
        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(cwd = %cwd.display(), ?limit, "Test command timed out");
                    return Ok((false, format!("timed out after {:?}", limit)));
                }
            },
            None => child.wait_with_output().await?,
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok((
            output.status.success(),
            tail_chars(&combined, OUTPUT_TAIL).to_string(),
        ))
    }
}

#[async_trait]
impl TestExecutor for ScriptTestExecutor {
    async fn run_task_tests(
        &self,
        project_dir: &Path,
        tasks: &[String],
    ) -> Result<TestOutcome, TestRunError> {
        for task in tasks {
            let script = runner_script(project_dir, task);
            if !script.is_file() {
                let available = list_dir(&project_dir.join(TESTS_DIR));
                debug!(task = %task, ?available, "Runner script missing");
                return Err(TestRunError::MissingArtifact {
                    task: task.clone(),
                    path: script,
                });
            }

            let script_arg = script.to_string_lossy();
            let (passed, output) = self
                .run_command(&self.shell, &[script_arg.as_ref()], project_dir)
                .await?;
            if passed {
                info!(task = %task, "Unit test passed");
            } else {
                info!(task = %task, "Unit test failed");
                return Ok(TestOutcome::failed(task.clone(), output));
            }
        }
        Ok(TestOutcome::Passed)
    }

    async fn run_suite(&self, project_dir: &Path) -> Result<TestOutcome, TestRunError> {
        let files = discover_suite(&project_dir.join(TESTS_DIR))?;
        info!(count = files.len(), "Running discovered test files");

        for file in files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let file_arg = file.to_string_lossy();
            let (passed, output) = self
                .run_command(
                    &self.python,
                    &["-m", "pytest", file_arg.as_ref(), "-v"],
                    project_dir,
                )
                .await?;
            if passed {
                info!(file = %name, "Test file passed");
            } else {
                info!(file = %name, "Test file failed");
                return Ok(TestOutcome::failed(name, output));
            }
        }
        Ok(TestOutcome::Passed)
    }
}

/// Python files under `tests_dir` that the suite runs, sorted by name.
pub fn discover_suite(tests_dir: &Path) -> Result<Vec<PathBuf>, TestRunError> {
    if !tests_dir.is_dir() {
        return Err(TestRunError::MissingTestsDir(tests_dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(tests_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_file()
            && name.ends_with(".py")
            && !name.starts_with("test_")
            && !name.starts_with("__")
        {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(TestRunError::NoTestFiles(tests_dir.to_path_buf()));
    }
    files.sort();
    Ok(files)
}

fn list_dir(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}
