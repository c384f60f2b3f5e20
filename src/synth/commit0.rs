//! Whole-repository completion variant (Commit0 style).
//!
//! The raw snapshot is the original project scaffold with the final
//! accepted test suite swapped in, every task boundary hidden and every
//! placeholder raise replaced by `pass`. Each iteration hands a fresh copy
//! of the snapshot to the agent and converts its log.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tera::Context;
use tracing::{info, warn};

use super::cleanup::{cleanup_test_files, strip_placeholders, RenameStyle};
use crate::agent::{AgentRequest, CodingAgent};
use crate::error::SynthError;
use crate::manifest::{load_project_manifest, TaskIndex};
use crate::prompts::{PromptId, PromptLibrary};
use crate::rollout::{copy_tree, remove_tree, replace_tree, RuntimeLayout, Stage, TESTS_DIR};
use crate::trajectory::convert_log;

/// Directory under the runtime that holds the raw snapshot.
pub const RAW_DIR: &str = "commit0_raw";

/// Outcome of a commit0 run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Commit0Report {
    /// Task whose implementation checkpoint supplied the tests.
    pub source_task: Option<String>,
    pub raw_dir: Option<PathBuf>,
    /// Converted trajectory keys, in iteration order.
    pub converted: Vec<String>,
    /// Iterations that failed, with the error message.
    pub failed: Vec<(u32, String)>,
}

/// Builds the raw snapshot and runs the completion iterations.
pub struct Commit0Builder {
    agent: Arc<dyn CodingAgent>,
    prompts: PromptLibrary,
}

impl Commit0Builder {
    pub fn new(agent: Arc<dyn CodingAgent>, prompts: PromptLibrary) -> Self {
        Self { agent, prompts }
    }

    /// Runs `iterations` completion attempts from the last task with an
    /// accepted rollout. Returns an empty report when no task qualifies.
    pub async fn run(
        &self,
        project_dir: &Path,
        layout: &RuntimeLayout,
        iterations: u32,
    ) -> Result<Commit0Report, SynthError> {
        let project = load_project_manifest(project_dir)?;
        let index = TaskIndex::build(&project);
        let mut report = Commit0Report::default();

        let Some(task) = index
            .task_numbers()
            .filter(|task| layout.has_rollout_records(task))
            .last()
        else {
            warn!(path = %layout.root().display(), "No task with an accepted rollout, skipping commit0");
            return Ok(report);
        };
        let task = task.to_string();
        info!(task = %task, iterations, "Building commit0 variant");

        let raw_dir = self.build_raw(project_dir, layout, &index, &task)?;

        for iteration in 1..=iterations {
            match self.iterate(layout, &raw_dir, &task, iteration, iterations).await {
                Ok(key) => report.converted.push(key),
                Err(e) => {
                    warn!(iteration, error = %e, "Commit0 iteration failed");
                    report.failed.push((iteration, e.to_string()));
                }
            }
        }

        report.source_task = Some(task);
        report.raw_dir = Some(raw_dir);
        Ok(report)
    }

    /// Creates `<runtime>/commit0_raw/<project>` from the scaffold and the
    /// final tests.
    fn build_raw(
        &self,
        project_dir: &Path,
        layout: &RuntimeLayout,
        index: &TaskIndex,
        task: &str,
    ) -> Result<PathBuf, SynthError> {
        let final_tests = layout
            .checkpoint(task, Stage::Implementation)
            .join(TESTS_DIR);
        if !final_tests.is_dir() {
            return Err(SynthError::MissingArtifact(final_tests));
        }

        let raw_dir = layout.root().join(RAW_DIR).join(layout.project_name());
        replace_tree(project_dir, &raw_dir)?;
        replace_tree(&final_tests, &raw_dir.join(TESTS_DIR))?;

        let stripped = strip_placeholders(&raw_dir)?;
        let renamed = cleanup_test_files(&raw_dir, index, RenameStyle::Prefixed)?;
        info!(path = %raw_dir.display(), stripped, renamed, "Prepared commit0 snapshot");
        Ok(raw_dir)
    }

    async fn iterate(
        &self,
        layout: &RuntimeLayout,
        raw_dir: &Path,
        task: &str,
        iteration: u32,
        iterations: u32,
    ) -> Result<String, SynthError> {
        let key = iteration_key(iteration, iterations);
        let workspace = layout.root().join(&key);
        let log_dir = layout.root().join(format!("log_{}_{}", task, key));

        remove_tree(&workspace)?;
        copy_tree(raw_dir, &workspace.join(layout.project_name()))?;

        let mut context = Context::new();
        context.insert("workspace_dir_name", layout.project_name());
        let prompt = self.prompts.render(PromptId::FinishFullOpenhands, &context)?;

        info!(iteration, workspace = %workspace.display(), "Calling agent to complete the repository");
        self.agent
            .run(&AgentRequest::new(prompt, &workspace).with_output_dir(&log_dir))
            .await?;

        convert_log(&log_dir, &layout.converted_dir(), &key).await?;
        Ok(key)
    }
}

/// `commit0` for a single iteration, `commit0_iter<K>` otherwise.
pub fn iteration_key(iteration: u32, iterations: u32) -> String {
    if iterations <= 1 {
        "commit0".to_string()
    } else {
        format!("commit0_iter{}", iteration)
    }
}
