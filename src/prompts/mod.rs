//! Prompt library.
//!
//! Every LLM and agent call renders one named template. Built-in templates
//! live in [`templates`]; a prompt directory may override any of them with
//! a `<name>.jinja` file.
//!
//! ```ignore
//! use swe_playground::prompts::{PromptId, PromptLibrary};
//! use tera::Context;
//!
//! let library = PromptLibrary::new(None)?;
//! let mut context = Context::new();
//! context.insert("workspace_dir_name", "calculator");
//! let prompt = library.render(PromptId::FinishFullOpenhands, &context)?;
//! ```

pub mod templates;

use std::path::{Path, PathBuf};

use tera::{Context, Tera};
use tracing::debug;

use crate::error::PromptError;

/// Names of every prompt the pipeline renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    ProposeProjectsSystem,
    ProposeProjectsUser,
    ProposeTasksSystem,
    ProposeTasksUser,
    ProposeTasksUserContinue,
    UnitTestSystem,
    UnitTestUser,
    SetupProjectRepoOpenhands,
    GenerateUnitTestOpenhands,
    FinishTaskOpenhands,
    ProposeIssueSystem,
    ProposeIssueUser,
    ApplyIssueOpenhands,
    ApplyIssueSwtOpenhands,
    FixIssueOpenhands,
    ReproduceIssueOpenhands,
    FinishFullOpenhands,
    FixDockerfileOpenhands,
}

impl PromptId {
    pub const ALL: [PromptId; 18] = [
        PromptId::ProposeProjectsSystem,
        PromptId::ProposeProjectsUser,
        PromptId::ProposeTasksSystem,
        PromptId::ProposeTasksUser,
        PromptId::ProposeTasksUserContinue,
        PromptId::UnitTestSystem,
        PromptId::UnitTestUser,
        PromptId::SetupProjectRepoOpenhands,
        PromptId::GenerateUnitTestOpenhands,
        PromptId::FinishTaskOpenhands,
        PromptId::ProposeIssueSystem,
        PromptId::ProposeIssueUser,
        PromptId::ApplyIssueOpenhands,
        PromptId::ApplyIssueSwtOpenhands,
        PromptId::FixIssueOpenhands,
        PromptId::ReproduceIssueOpenhands,
        PromptId::FinishFullOpenhands,
        PromptId::FixDockerfileOpenhands,
    ];

    /// File stem used for overrides.
    pub fn name(&self) -> &'static str {
        match self {
            PromptId::ProposeProjectsSystem => "propose-projects-system",
            PromptId::ProposeProjectsUser => "propose-projects-user",
            PromptId::ProposeTasksSystem => "propose-tasks-system",
            PromptId::ProposeTasksUser => "propose-tasks-user",
            PromptId::ProposeTasksUserContinue => "propose-tasks-user-continue",
            PromptId::UnitTestSystem => "unit-test-system",
            PromptId::UnitTestUser => "unit-test-user",
            PromptId::SetupProjectRepoOpenhands => "setup-project-repo-openhands",
            PromptId::GenerateUnitTestOpenhands => "generate-unit-test-openhands",
            PromptId::FinishTaskOpenhands => "finish-task-openhands",
            PromptId::ProposeIssueSystem => "propose-issue-system",
            PromptId::ProposeIssueUser => "propose-issue-user",
            PromptId::ApplyIssueOpenhands => "apply-issue-openhands",
            PromptId::ApplyIssueSwtOpenhands => "apply-issue-swt-openhands",
            PromptId::FixIssueOpenhands => "fix-issue-openhands",
            PromptId::ReproduceIssueOpenhands => "reproduce-issue-openhands",
            PromptId::FinishFullOpenhands => "finish-full-openhands",
            PromptId::FixDockerfileOpenhands => "fix-dockerfile-openhands",
        }
    }

    fn builtin(&self) -> &'static str {
        use templates::*;
        match self {
            PromptId::ProposeProjectsSystem => PROPOSE_PROJECTS_SYSTEM,
            PromptId::ProposeProjectsUser => PROPOSE_PROJECTS_USER,
            PromptId::ProposeTasksSystem => PROPOSE_TASKS_SYSTEM,
            PromptId::ProposeTasksUser => PROPOSE_TASKS_USER,
            PromptId::ProposeTasksUserContinue => PROPOSE_TASKS_USER_CONTINUE,
            PromptId::UnitTestSystem => UNIT_TEST_SYSTEM,
            PromptId::UnitTestUser => UNIT_TEST_USER,
            PromptId::SetupProjectRepoOpenhands => SETUP_PROJECT_REPO_OPENHANDS,
            PromptId::GenerateUnitTestOpenhands => GENERATE_UNIT_TEST_OPENHANDS,
            PromptId::FinishTaskOpenhands => FINISH_TASK_OPENHANDS,
            PromptId::ProposeIssueSystem => PROPOSE_ISSUE_SYSTEM,
            PromptId::ProposeIssueUser => PROPOSE_ISSUE_USER,
            PromptId::ApplyIssueOpenhands => APPLY_ISSUE_OPENHANDS,
            PromptId::ApplyIssueSwtOpenhands => APPLY_ISSUE_SWT_OPENHANDS,
            PromptId::FixIssueOpenhands => FIX_ISSUE_OPENHANDS,
            PromptId::ReproduceIssueOpenhands => REPRODUCE_ISSUE_OPENHANDS,
            PromptId::FinishFullOpenhands => FINISH_FULL_OPENHANDS,
            PromptId::FixDockerfileOpenhands => FIX_DOCKERFILE_OPENHANDS,
        }
    }
}

impl std::fmt::Display for PromptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for PromptId {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PromptId::ALL
            .iter()
            .copied()
            .find(|id| id.name() == s)
            .ok_or_else(|| PromptError::NotFound(s.to_string()))
    }
}

/// Renders prompts from built-in templates or directory overrides.
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
}

impl PromptLibrary {
    /// Creates a library. `override_dir`, when given, must exist.
    pub fn new(override_dir: Option<&Path>) -> Result<Self, PromptError> {
        if let Some(dir) = override_dir {
            if !dir.is_dir() {
                return Err(PromptError::MissingDirectory(dir.to_path_buf()));
            }
        }
        Ok(Self {
            override_dir: override_dir.map(Path::to_path_buf),
        })
    }

    /// Library using only built-in templates.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Raw template source for `id`.
    pub fn template(&self, id: PromptId) -> Result<String, PromptError> {
        if let Some(dir) = &self.override_dir {
            let path = dir.join(format!("{}.jinja", id.name()));
            if path.is_file() {
                debug!(prompt = %id, path = %path.display(), "Using prompt override");
                return Ok(std::fs::read_to_string(path)?);
            }
        }
        Ok(id.builtin().to_string())
    }

    /// Renders the template for `id` with `context`.
    pub fn render(&self, id: PromptId, context: &Context) -> Result<String, PromptError> {
        let template = self.template(id)?;
        Ok(Tera::one_off(&template, context, false)?)
    }

    /// Renders a template that takes no variables.
    pub fn render_plain(&self, id: PromptId) -> Result<String, PromptError> {
        self.render(id, &Context::new())
    }
}
