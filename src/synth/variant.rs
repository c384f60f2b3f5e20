//! Issue-injection variants: fix (SWE-bench style) and reproduce
//! (SWT-Bench style).
//!
//! Both variants share one driver. They differ in the polarity of each
//! check:
//!
//! | | injection accepted when | resolution accepted when |
//! |---|---|---|
//! | fix | the task's own test fails | the task's own test passes |
//! | reproduce | the discovered suite passes | the discovered suite fails |
//!
//! The fix variant also hides `tests/` from the resolving agent, while the
//! reproduce variant renames every task's test artifacts right after the
//! issue is applied.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tera::Context;
use tracing::{debug, info, warn};

use super::cleanup::{cleanup_test_files, RenameStyle};
use super::issue::{IssueProposal, IssueProposer};
use crate::agent::{AgentRequest, CodingAgent};
use crate::error::SynthError;
use crate::manifest::{load_project_manifest, Project, TaskIndex, TaskTests};
use crate::prompts::{PromptId, PromptLibrary};
use crate::rollout::{
    remove_tree, replace_tree, Attempt, BoundedRetry, RetryOutcome, RuntimeLayout, Stage,
    TestExecutor, TestOutcome, TESTS_DIR,
};
use crate::trajectory::convert_log;

/// Attempts for both injection and resolution.
pub const DEFAULT_VARIANT_ATTEMPTS: u32 = 3;

/// Which benchmark variant to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    Fix,
    Reproduce,
}

impl VariantKind {
    pub fn issue_stage(&self) -> Stage {
        match self {
            VariantKind::Fix => Stage::Issue,
            VariantKind::Reproduce => Stage::IssueSwt,
        }
    }

    /// Stage that owns the resolution workspace, log and trajectory.
    pub fn resolve_stage(&self) -> Stage {
        match self {
            VariantKind::Fix => Stage::Fix,
            VariantKind::Reproduce => Stage::Reproduce,
        }
    }

    fn apply_prompt(&self) -> PromptId {
        match self {
            VariantKind::Fix => PromptId::ApplyIssueOpenhands,
            VariantKind::Reproduce => PromptId::ApplyIssueSwtOpenhands,
        }
    }

    fn resolve_prompt(&self) -> PromptId {
        match self {
            VariantKind::Fix => PromptId::FixIssueOpenhands,
            VariantKind::Reproduce => PromptId::ReproduceIssueOpenhands,
        }
    }

    /// Whether the resolving agent works without the tests directory.
    pub fn hides_tests(&self) -> bool {
        matches!(self, VariantKind::Fix)
    }

    /// Tests run to judge injection and resolution.
    async fn check(
        &self,
        executor: &dyn TestExecutor,
        project_dir: &Path,
        task: &str,
    ) -> Result<TestOutcome, SynthError> {
        Ok(match self {
            VariantKind::Fix => {
                executor
                    .run_task_tests(project_dir, &[task.to_string()])
                    .await?
            }
            VariantKind::Reproduce => executor.run_suite(project_dir).await?,
        })
    }

    /// An injected issue is kept when the fix variant breaks the task's
    /// test, or when the reproduce variant leaves the suite passing.
    pub fn injection_accepted(&self, outcome: &TestOutcome) -> bool {
        match self {
            VariantKind::Fix => !outcome.is_passed(),
            VariantKind::Reproduce => outcome.is_passed(),
        }
    }

    /// A resolution is kept when the fix variant passes again, or when the
    /// reproduce variant's new test makes the suite fail.
    pub fn resolution_accepted(&self, outcome: &TestOutcome) -> bool {
        match self {
            VariantKind::Fix => outcome.is_passed(),
            VariantKind::Reproduce => !outcome.is_passed(),
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantKind::Fix => f.write_str("SWE-bench"),
            VariantKind::Reproduce => f.write_str("SWT-Bench"),
        }
    }
}

/// Per-task results of a variant run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantReport {
    /// Tasks whose trajectory was converted in this run.
    pub completed: Vec<String>,
    /// Tasks that already had a converted trajectory.
    pub skipped: Vec<String>,
    /// Tasks given up after exhausting attempts.
    pub abandoned: Vec<String>,
    /// Tasks aborted by an error, with its message.
    pub failed: Vec<(String, String)>,
}

/// Builds fix or reproduce variants for every accepted rollout task.
pub struct VariantSynthesizer {
    kind: VariantKind,
    agent: Arc<dyn CodingAgent>,
    executor: Arc<dyn TestExecutor>,
    proposer: IssueProposer,
    prompts: PromptLibrary,
    max_attempts: u32,
}

impl VariantSynthesizer {
    pub fn new(
        kind: VariantKind,
        agent: Arc<dyn CodingAgent>,
        executor: Arc<dyn TestExecutor>,
        proposer: IssueProposer,
        prompts: PromptLibrary,
    ) -> Self {
        Self {
            kind,
            agent,
            executor,
            proposer,
            prompts,
            max_attempts: DEFAULT_VARIANT_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn kind(&self) -> VariantKind {
        self.kind
    }

    /// Processes tasks in index order, stopping at the first task without
    /// accepted rollout trajectories. Errors for one task are logged and
    /// the next task proceeds.
    pub async fn run(
        &self,
        project_dir: &Path,
        layout: &RuntimeLayout,
    ) -> Result<VariantReport, SynthError> {
        let project = load_project_manifest(project_dir)?;
        let index = TaskIndex::build(&project);
        let mut report = VariantReport::default();

        info!(variant = %self.kind, tasks = index.len(), "Generating benchmark variant");

        for tests in index.values() {
            let task = tests.task_number.as_str();
            if layout.has_record(task, self.kind.resolve_stage()) {
                info!(task, variant = %self.kind, "Task already has a converted trajectory, skipping");
                report.skipped.push(task.to_string());
                continue;
            }
            if !layout.has_rollout_records(task) {
                info!(task, "No accepted rollout for task, stopping");
                break;
            }

            info!(task, variant = %self.kind, "Running pipeline for task");
            match self.run_task(&project, &index, layout, tests).await {
                Ok(true) => report.completed.push(task.to_string()),
                Ok(false) => report.abandoned.push(task.to_string()),
                Err(e) => {
                    warn!(task, variant = %self.kind, error = %e, "Variant generation failed for task");
                    report.failed.push((task.to_string(), e.to_string()));
                }
            }
        }

        info!(
            variant = %self.kind,
            completed = report.completed.len(),
            abandoned = report.abandoned.len(),
            "Variant pipeline completed"
        );
        Ok(report)
    }

    /// Returns whether a trajectory was produced for the task.
    async fn run_task(
        &self,
        project: &Project,
        index: &TaskIndex,
        layout: &RuntimeLayout,
        tests: &TaskTests,
    ) -> Result<bool, SynthError> {
        let injected = BoundedRetry::abandon_item(self.max_attempts)
            .run(&tests.task_number, move |_| {
                self.inject(project, index, layout, tests)
            })
            .await?;
        let Some((proposal, issue_dir)) = injected.into_value() else {
            return Ok(false);
        };

        let proposal = &proposal;
        let issue_dir = issue_dir.as_path();
        let resolved = BoundedRetry::abandon_item(self.max_attempts)
            .run(&tests.task_number, move |_| {
                self.resolve(layout, tests, proposal, issue_dir)
            })
            .await?;
        let completed = matches!(resolved, RetryOutcome::Completed { .. });
        debug!(
            task = %tests.task_number,
            attempts = resolved.attempts(),
            completed,
            "Resolution finished"
        );
        Ok(completed)
    }

    /// Proposes and applies one issue, keeping it if the tests react with
    /// the expected polarity.
    async fn inject(
        &self,
        project: &Project,
        index: &TaskIndex,
        layout: &RuntimeLayout,
        tests: &TaskTests,
    ) -> Result<Attempt<(IssueProposal, PathBuf)>, SynthError> {
        let task = tests.task_number.as_str();
        let ground_truth = layout.checkpoint(task, Stage::Implementation);
        let proposal = self
            .proposer
            .propose(&project.project_description, tests, &ground_truth)
            .await?;

        let issue_dir = layout.checkpoint(task, self.kind.issue_stage());
        replace_tree(&ground_truth, &issue_dir)?;

        let mut context = Context::new();
        context.insert("issue_description", &proposal.issue);
        context.insert("project_description", &project.project_description);
        context.insert("task_number", task);
        context.insert("task_description", &tests.task_description);
        let prompt = self.prompts.render(self.kind.apply_prompt(), &context)?;

        info!(task, "Calling agent to apply the issue");
        self.agent.run(&AgentRequest::new(prompt, &issue_dir)).await?;

        if self.kind == VariantKind::Reproduce {
            cleanup_test_files(&issue_dir, index, RenameStyle::Plain)?;
        }

        let outcome = self.kind.check(self.executor.as_ref(), &issue_dir, task).await?;
        if self.kind.injection_accepted(&outcome) {
            info!(task, variant = %self.kind, "Issue successfully applied");
            Ok(Attempt::Done((proposal, issue_dir)))
        } else {
            Ok(Attempt::Retry(match self.kind {
                VariantKind::Fix => "tests still pass after applying the issue".to_string(),
                VariantKind::Reproduce => "tests fail after applying the issue".to_string(),
            }))
        }
    }

    /// Runs the resolving agent on a fresh copy of the issue checkpoint.
    async fn resolve(
        &self,
        layout: &RuntimeLayout,
        tests: &TaskTests,
        proposal: &IssueProposal,
        issue_dir: &Path,
    ) -> Result<Attempt<PathBuf>, SynthError> {
        let task = tests.task_number.as_str();
        let stage = self.kind.resolve_stage();
        let workspace = layout.checkpoint(task, stage);
        let repo = layout.nested_checkpoint(task, stage);
        let log_dir = layout.log_dir(task, stage);

        replace_tree(issue_dir, &repo)?;
        if self.kind.hides_tests() {
            remove_tree(&repo.join(TESTS_DIR))?;
        }

        let mut context = Context::new();
        context.insert("issue_description", &proposal.description);
        context.insert("workspace_dir_name", layout.project_name());
        let prompt = self.prompts.render(self.kind.resolve_prompt(), &context)?;

        info!(task, variant = %self.kind, "Calling agent to resolve the issue");
        self.agent
            .run(&AgentRequest::new(prompt, &workspace).with_output_dir(&log_dir))
            .await?;

        if self.kind.hides_tests() {
            replace_tree(&issue_dir.join(TESTS_DIR), &repo.join(TESTS_DIR))?;
        }

        let outcome = self.kind.check(self.executor.as_ref(), &repo, task).await?;
        if !self.kind.resolution_accepted(&outcome) {
            return Ok(Attempt::Retry(match self.kind {
                VariantKind::Fix => "tests still failing after the fix attempt".to_string(),
                VariantKind::Reproduce => "tests still passing after the reproduce attempt".to_string(),
            }));
        }

        info!(task, variant = %self.kind, "Issue successfully resolved");
        let key = RuntimeLayout::record_key(task, stage);
        Ok(Attempt::Done(
            convert_log(&log_dir, &layout.converted_dir(), &key).await?,
        ))
    }
}
