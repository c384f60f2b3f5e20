//! Per-task rollout state machine.
//!
//! For every task in index order:
//!
//! 1. copy the previous accepted checkpoint to `<project>_<task>_unit_test`
//!    and have the agent write the task's tests (skipped if it exists),
//! 2. copy that to `<project>_<task>_implementation` and have the agent
//!    implement the task (skipped if it exists, resuming at validation),
//! 3. restore tampered tests from the unit-test checkpoint,
//! 4. run the cumulative test set, newest task first,
//! 5. accept and convert both stage logs, or delete both checkpoints and
//!    retry. A task that fails every attempt halts the whole rollout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tera::Context;
use tracing::{debug, error, info, warn};

use super::checkpoint::{copy_tree, read_test_prompt, remove_tree, RuntimeLayout, Stage};
use super::executor::{TestExecutor, TestOutcome};
use super::retry::{Attempt, BoundedRetry, RetryOutcome};
use super::tamper::check_and_repair;
use crate::agent::{AgentRequest, CodingAgent};
use crate::error::RolloutError;
use crate::manifest::{load_project_manifest, Project, TaskIndex, TaskTests};
use crate::prompts::{PromptId, PromptLibrary};
use crate::trajectory::convert_log;

/// Attempts per task before the rollout halts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Summary of a finished rollout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloutReport {
    pub runtime_dir: PathBuf,
    /// Accepted tasks in processing order.
    pub completed: Vec<String>,
    /// Implementation checkpoint of the last accepted task.
    pub final_checkpoint: Option<PathBuf>,
}

/// Drives the coding agent through every task of a project.
pub struct RolloutMachine {
    agent: Arc<dyn CodingAgent>,
    executor: Arc<dyn TestExecutor>,
    prompts: PromptLibrary,
    max_attempts: u32,
}

impl RolloutMachine {
    pub fn new(
        agent: Arc<dyn CodingAgent>,
        executor: Arc<dyn TestExecutor>,
        prompts: PromptLibrary,
    ) -> Self {
        Self {
            agent,
            executor,
            prompts,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Rolls out every non-inert task of the project at `project_dir` into
    /// `layout`.
    ///
    /// # Errors
    ///
    /// [`RolloutError::RetriesExhausted`] when a task fails all attempts; no
    /// later task is started. Agent, test-artifact and conversion errors
    /// abort the run immediately.
    pub async fn run(
        &self,
        project_dir: &Path,
        layout: &RuntimeLayout,
    ) -> Result<RolloutReport, RolloutError> {
        let project = load_project_manifest(project_dir)?;
        let index = TaskIndex::build(&project);
        layout.ensure()?;

        info!(
            project = layout.project_name(),
            tasks = index.len(),
            runtime = %layout.root().display(),
            "Starting rollout"
        );

        let mut base = project_dir.to_path_buf();
        let mut cumulative: Vec<String> = Vec::new();
        let mut completed: Vec<String> = Vec::new();

        for tests in index.values() {
            cumulative.insert(0, tests.task_number.clone());
            info!(task = %tests.task_number, "Running pipeline for task");

            let accepted = self
                .roll_task(&project, &base, layout, tests, &cumulative)
                .await?;
            match accepted {
                RetryOutcome::Completed { value, attempts } => {
                    info!(task = %tests.task_number, attempts, "Task accepted");
                    completed.push(tests.task_number.clone());
                    base = value;
                }
                RetryOutcome::Halted { attempts, reason }
                | RetryOutcome::Abandoned { attempts, reason } => {
                    error!(
                        task = %tests.task_number,
                        attempts,
                        reason = %reason,
                        completed = completed.len(),
                        "Rollout halted"
                    );
                    return Err(RolloutError::RetriesExhausted {
                        task: tests.task_number.clone(),
                        attempts,
                        completed: completed.len(),
                    });
                }
            }
        }

        info!(completed = completed.len(), "Rollout pipeline completed");
        let final_checkpoint = completed
            .last()
            .map(|task| layout.checkpoint(task, Stage::Implementation));
        Ok(RolloutReport {
            runtime_dir: layout.root().to_path_buf(),
            completed,
            final_checkpoint,
        })
    }

    /// Runs the bounded attempt loop for one task, returning the accepted
    /// implementation checkpoint.
    async fn roll_task(
        &self,
        project: &Project,
        base: &Path,
        layout: &RuntimeLayout,
        tests: &TaskTests,
        cumulative: &[String],
    ) -> Result<RetryOutcome<PathBuf>, RolloutError> {
        BoundedRetry::halt_all(self.max_attempts)
            .run(&tests.task_number, move |_| {
                self.attempt(project, base, layout, tests, cumulative)
            })
            .await
    }

    async fn attempt(
        &self,
        project: &Project,
        base: &Path,
        layout: &RuntimeLayout,
        tests: &TaskTests,
        cumulative: &[String],
    ) -> Result<Attempt<PathBuf>, RolloutError> {
        let task = tests.task_number.as_str();
        let tests_checkpoint = layout.checkpoint(task, Stage::UnitTest);
        let implementation_checkpoint = layout.checkpoint(task, Stage::Implementation);
        let tests_log = layout.log_dir(task, Stage::UnitTest);
        let implementation_log = layout.log_dir(task, Stage::Implementation);

        if tests_checkpoint.exists() {
            info!(task, "Unit-test checkpoint exists, skipping test generation");
        } else {
            start_checkpoint(base, &tests_checkpoint)?;
            self.generate_tests(project, tests, &tests_checkpoint, &tests_log)
                .await
                .inspect_err(|_| discard(&tests_checkpoint))?;
        }

        if implementation_checkpoint.exists() {
            info!(task, "Implementation checkpoint exists, resuming at validation");
        } else {
            start_checkpoint(&tests_checkpoint, &implementation_checkpoint)?;
            self.implement(project, tests, &implementation_checkpoint, &implementation_log)
                .await
                .inspect_err(|_| discard(&implementation_checkpoint))?;
        }

        check_and_repair(&tests_checkpoint, &implementation_checkpoint, cumulative)?;

        match self
            .executor
            .run_task_tests(&implementation_checkpoint, cumulative)
            .await?
        {
            TestOutcome::Passed => {
                let converted = layout.converted_dir();
                convert_log(
                    &tests_log,
                    &converted,
                    &RuntimeLayout::record_key(task, Stage::UnitTest),
                )
                .await?;
                convert_log(
                    &implementation_log,
                    &converted,
                    &RuntimeLayout::record_key(task, Stage::Implementation),
                )
                .await?;
                Ok(Attempt::Done(implementation_checkpoint))
            }
            TestOutcome::Failed { target, output } => {
                debug!(task, failed = %target, output = %output, "Test output");
                remove_tree(&implementation_checkpoint)?;
                remove_tree(&tests_checkpoint)?;
                Ok(Attempt::Retry(format!("unit test for task {} failed", target)))
            }
        }
    }

    async fn generate_tests(
        &self,
        project: &Project,
        tests: &TaskTests,
        checkpoint: &Path,
        log_dir: &Path,
    ) -> Result<(), RolloutError> {
        let unit_test_prompt = read_test_prompt(checkpoint, tests).await?;

        let mut context = Context::new();
        context.insert("project_task", &project.project_description);
        context.insert("unit_test_prompt", &unit_test_prompt);
        let prompt = self
            .prompts
            .render(PromptId::GenerateUnitTestOpenhands, &context)?;

        info!(task = %tests.task_number, "Calling agent to generate unit tests");
        let request = AgentRequest::new(prompt, checkpoint).with_output_dir(log_dir);
        self.agent.run(&request).await?;
        Ok(())
    }

    async fn implement(
        &self,
        project: &Project,
        tests: &TaskTests,
        checkpoint: &Path,
        log_dir: &Path,
    ) -> Result<(), RolloutError> {
        let mut context = Context::new();
        context.insert("task_number", &tests.task_number);
        context.insert("task_description", &tests.task_description);
        context.insert("constraints", project.constraints());
        let prompt = self.prompts.render(PromptId::FinishTaskOpenhands, &context)?;

        info!(task = %tests.task_number, "Calling agent to finish the task");
        let request = AgentRequest::new(prompt, checkpoint).with_output_dir(log_dir);
        self.agent.run(&request).await?;
        Ok(())
    }
}

/// Seeds a stage checkpoint from `src`. A copy that fails partway leaves
/// nothing behind, so a resumed run never mistakes it for a finished stage.
fn start_checkpoint(src: &Path, dst: &Path) -> std::io::Result<()> {
    copy_tree(src, dst).inspect_err(|_| discard(dst))
}

/// Removes a half-written checkpoint after a failed copy or agent run.
fn discard(checkpoint: &Path) {
    warn!(path = %checkpoint.display(), "Removing partial checkpoint");
    if let Err(e) = remove_tree(checkpoint) {
        warn!(path = %checkpoint.display(), error = %e, "Failed to remove partial checkpoint");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentTranscript;
    use crate::error::{AgentError, TestRunError};
    use crate::manifest::{save_manifest, Module, Phase, Task, TestBundle, TestCase};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Writes the task's test artifacts when asked for tests and a marker
    /// file when asked to implement; always leaves a completion log.
    struct FileWritingAgent {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CodingAgent for FileWritingAgent {
        async fn run(&self, request: &AgentRequest) -> Result<AgentTranscript, AgentError> {
            let log_dir = request.output_dir.clone().unwrap();
            let kind = if log_dir.to_string_lossy().ends_with("unit_test") {
                "unit_test"
            } else {
                "implementation"
            };
            self.calls.lock().unwrap().push(kind.to_string());

            let tests = request.working_dir.join("tests");
            if kind == "unit_test" {
                std::fs::write(tests.join("1.1.1.sh"), "test -f impl.txt\n")?;
                std::fs::write(tests.join("test_1_1_1.py"), "def test(): pass\n")?;
            } else {
                std::fs::write(request.working_dir.join("impl.txt"), "done")?;
            }

            let completions = log_dir.join("log_completions");
            std::fs::create_dir_all(&completions)?;
            std::fs::write(
                completions.join("default-1.0.json"),
                serde_json::json!({
                    "messages": [
                        {"role": "system", "content": "sys"},
                        {"role": "user", "content": "task"},
                        {"role": "user", "content": "redundant"}
                    ],
                    "response": {"choices": [{"message": {"role": "assistant", "content": "ok"}}]}
                })
                .to_string(),
            )?;
            Ok(AgentTranscript::default())
        }
    }

    struct FailingExecutor;

    #[async_trait]
    impl TestExecutor for FailingExecutor {
        async fn run_task_tests(
            &self,
            _project_dir: &Path,
            tasks: &[String],
        ) -> Result<TestOutcome, TestRunError> {
            Ok(TestOutcome::failed(tasks[0].clone(), "nope"))
        }

        async fn run_suite(&self, _project_dir: &Path) -> Result<TestOutcome, TestRunError> {
            Ok(TestOutcome::Passed)
        }
    }

    fn project_dir(root: &Path) -> PathBuf {
        let dir = root.join("calc");
        std::fs::create_dir_all(dir.join("tests")).unwrap();
        std::fs::write(dir.join("tests/1.1.1.md"), "proposal").unwrap();
        let project = Project {
            project_name: Some("calc".to_string()),
            project_description: "A calculator".to_string(),
            constraints: Some("no eval".to_string()),
            phases: vec![Phase {
                phase_number: 1,
                title: "Core".to_string(),
                goal: "Basics".to_string(),
                modules: vec![Module {
                    module_number: "1.1".to_string(),
                    title: "Parser".to_string(),
                    tasks: vec![Task {
                        task_number: "1.1.1".to_string(),
                        title: "Tokenize".to_string(),
                        description: "Split input".to_string(),
                        unit_tests: TestBundle {
                            code_tests: vec![TestCase::new("test_tokens", "splits")],
                            visual_tests: vec![],
                        },
                        ..Default::default()
                    }],
                }],
            }],
            ..Default::default()
        };
        save_manifest(&dir.join("tasks.json"), &project).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_single_task_accepted() {
        let root = TempDir::new().unwrap();
        let project = project_dir(root.path());
        let layout = RuntimeLayout::new(root.path().join("runtime"), "calc");
        let agent = Arc::new(FileWritingAgent {
            calls: Mutex::new(Vec::new()),
        });
        let machine = RolloutMachine::new(
            agent.clone(),
            Arc::new(crate::rollout::ScriptTestExecutor::new()),
            PromptLibrary::builtin(),
        );

        let report = machine.run(&project, &layout).await.unwrap();
        assert_eq!(report.completed, vec!["1.1.1".to_string()]);
        assert!(layout.has_rollout_records("1.1.1"));
        assert_eq!(
            report.final_checkpoint,
            Some(layout.checkpoint("1.1.1", Stage::Implementation))
        );
        assert_eq!(*agent.calls.lock().unwrap(), vec!["unit_test", "implementation"]);
    }

    #[tokio::test]
    async fn test_exhaustion_removes_checkpoints_and_halts() {
        let root = TempDir::new().unwrap();
        let project = project_dir(root.path());
        let layout = RuntimeLayout::new(root.path().join("runtime"), "calc");
        let agent = Arc::new(FileWritingAgent {
            calls: Mutex::new(Vec::new()),
        });
        let machine =
            RolloutMachine::new(agent.clone(), Arc::new(FailingExecutor), PromptLibrary::builtin());

        let err = machine.run(&project, &layout).await.unwrap_err();
        match err {
            RolloutError::RetriesExhausted {
                task,
                attempts,
                completed,
            } => {
                assert_eq!(task, "1.1.1");
                assert_eq!(attempts, 3);
                assert_eq!(completed, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(agent.calls.lock().unwrap().len(), 6);
        assert!(!layout.checkpoint("1.1.1", Stage::UnitTest).exists());
        assert!(!layout.checkpoint("1.1.1", Stage::Implementation).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_copy_leaves_no_checkpoint() {
        let root = TempDir::new().unwrap();
        let src = root.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("a.txt"), "a").unwrap();
        // Sockets cannot be opened for reading, so copying one fails.
        let _listener = std::os::unix::net::UnixListener::bind(src.join("s")).unwrap();
        let dst = root.path().join("calc_1.1.1_unit_test");

        assert!(start_checkpoint(&src, &dst).is_err());
        assert!(!dst.exists());
    }
}
