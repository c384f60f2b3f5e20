//! Project and task proposal.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tera::Context;
use tracing::info;

use crate::error::{LlmError, ProposeError};
use crate::llm::{TagParser, TextGenerator};
use crate::prompts::{PromptId, PromptLibrary};

static PROJECT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)Project \d+:\s*<proposed_project>(.*?)</proposed_project>\s*<repo_name>(.*?)</repo_name>\s*<programming_language>(.*?)</programming_language>\s*<constraints>(.*?)</constraints>",
    )
    .expect("static regex")
});

/// One proposed project. Serialized as `<repo_name>.json`; `tasks` is
/// filled in once tasks have been proposed for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectProposal {
    pub project_description: String,
    pub repo_name: String,
    pub programming_language: String,
    /// Libraries the implementation must not lean on for its core logic.
    pub constraints: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<String>,
}

impl ProjectProposal {
    pub fn load(path: &Path) -> Result<Self, ProposeError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ProposeError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Extracts every `Project K:` block from a proposal response. Blocks
/// missing any of the four fields are ignored.
pub fn parse_projects(response: &str) -> Vec<ProjectProposal> {
    PROJECT_BLOCK
        .captures_iter(response)
        .map(|caps| ProjectProposal {
            project_description: caps[1].trim().to_string(),
            repo_name: caps[2].trim().to_string(),
            programming_language: caps[3].trim().to_string(),
            constraints: caps[4].trim().to_string(),
            tasks: None,
        })
        .collect()
}

/// Writes each proposal to `<output_dir>/<repo_name>.json`.
pub fn save_proposals(
    proposals: &[ProjectProposal],
    output_dir: &Path,
) -> Result<Vec<PathBuf>, ProposeError> {
    std::fs::create_dir_all(output_dir)?;
    proposals
        .iter()
        .map(|proposal| {
            let path = output_dir.join(format!("{}.json", proposal.repo_name));
            proposal.save(&path)?;
            Ok(path)
        })
        .collect()
}

/// LLM-backed proposal of projects and their task plans.
#[derive(Clone)]
pub struct Proposer {
    generator: TextGenerator,
    prompts: PromptLibrary,
}

impl Proposer {
    pub fn new(generator: TextGenerator, prompts: PromptLibrary) -> Self {
        Self { generator, prompts }
    }

    pub fn generator(&self) -> &TextGenerator {
        &self.generator
    }

    pub fn prompts(&self) -> &PromptLibrary {
        &self.prompts
    }

    /// Asks for `num_projects` diverse projects.
    ///
    /// # Errors
    ///
    /// [`ProposeError::NoProposals`] when the response holds no complete
    /// project block.
    pub async fn propose_projects(
        &self,
        num_projects: usize,
    ) -> Result<Vec<ProjectProposal>, ProposeError> {
        let system = self.prompts.render_plain(PromptId::ProposeProjectsSystem)?;
        let mut context = Context::new();
        context.insert("num_projects", &num_projects);
        let user = self.prompts.render(PromptId::ProposeProjectsUser, &context)?;

        info!(num_projects, model = self.generator.model(), "Calling LLM to propose projects");
        let response = self.generator.generate(&system, &user).await?;

        let proposals = parse_projects(&response);
        if proposals.is_empty() {
            return Err(ProposeError::NoProposals);
        }
        info!(count = proposals.len(), "Parsed project proposals");
        Ok(proposals)
    }

    /// Asks for the markdown task plan of a project, continuing once if the
    /// `<tasks>` block is cut off.
    pub async fn propose_tasks(
        &self,
        project_description: &str,
        constraints: &str,
    ) -> Result<String, ProposeError> {
        let system = self.prompts.render_plain(PromptId::ProposeTasksSystem)?;
        let mut context = Context::new();
        context.insert("project_description", project_description);
        context.insert("constraints", constraints);
        let user = self.prompts.render(PromptId::ProposeTasksUser, &context)?;

        info!(model = self.generator.model(), "Calling LLM to propose tasks for the project");
        let prompts = &self.prompts;
        let response = self
            .generator
            .generate_with_continuation(&system, &user, "tasks", |partial| {
                context.insert("response", partial);
                Ok::<_, LlmError>(prompts.render(PromptId::ProposeTasksUserContinue, &context)?)
            })
            .await?;

        let mut fields = TagParser::new().required("tasks").parse(&response)?;
        Ok(fields.take("tasks")?)
    }
}
