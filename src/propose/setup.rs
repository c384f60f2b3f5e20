//! Repository setup from a language starter template.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tera::Context;
use tracing::{info, warn};

use super::projects::ProjectProposal;
use crate::agent::{AgentRequest, CodingAgent};
use crate::error::ProposeError;
use crate::manifest::{convert_markdown, ManifestEnvelope, MANIFEST_FILE, PLAN_FILE};
use crate::prompts::{PromptId, PromptLibrary};
use crate::rollout::{copy_tree, remove_tree};

/// Starter directory name for a proposal's programming language.
pub fn starter_name(language: &str) -> Result<&'static str, ProposeError> {
    match language.trim().to_lowercase().as_str() {
        "python" => Ok("python"),
        "c++" => Ok("c++"),
        "rust" => Ok("rust"),
        "javascript" => Ok("javascript"),
        _ => Err(ProposeError::UnsupportedLanguage(language.to_string())),
    }
}

/// Creates a project repository and lets the agent lay out its skeleton.
pub struct RepoSetup {
    agent: Arc<dyn CodingAgent>,
    prompts: PromptLibrary,
    starters_dir: PathBuf,
}

impl RepoSetup {
    pub fn new(agent: Arc<dyn CodingAgent>, prompts: PromptLibrary, starters_dir: PathBuf) -> Self {
        Self {
            agent,
            prompts,
            starters_dir,
        }
    }

    /// Copies the starter to `<output_dir>/<repo_name>`, writes and converts
    /// the task plan, then runs the setup agent. The project directory is
    /// removed if the agent fails.
    pub async fn setup(
        &self,
        proposal: &ProjectProposal,
        tasks: &str,
        output_dir: &Path,
    ) -> Result<PathBuf, ProposeError> {
        let starter = self
            .starters_dir
            .join(starter_name(&proposal.programming_language)?);
        if !starter.is_dir() {
            return Err(ProposeError::MissingStarter(starter));
        }

        std::fs::create_dir_all(output_dir)?;
        let project_dir = std::path::absolute(output_dir.join(&proposal.repo_name))?;
        if project_dir.exists() {
            return Err(ProposeError::ProjectExists(project_dir));
        }

        copy_tree(&starter, &project_dir)?;
        info!(starter = %starter.display(), path = %project_dir.display(), "Copied starter template");

        let plan = project_dir.join(PLAN_FILE);
        std::fs::write(&plan, tasks)?;
        convert_markdown(
            &plan,
            &project_dir.join(MANIFEST_FILE),
            ManifestEnvelope {
                project_name: Some(proposal.repo_name.clone()),
                project_id: Some(Utc::now().timestamp().to_string()),
                constraints: Some(proposal.constraints.clone()),
            },
        )?;

        let mut context = Context::new();
        context.insert("project_description", &proposal.project_description);
        context.insert("constraints", &proposal.constraints);
        let prompt = self.prompts.render(PromptId::SetupProjectRepoOpenhands, &context)?;

        info!(repo = %proposal.repo_name, "Calling agent to set up the repository");
        if let Err(e) = self.agent.run(&AgentRequest::new(prompt, &project_dir)).await {
            warn!(path = %project_dir.display(), error = %e, "Setup failed, removing project directory");
            if let Err(cleanup) = remove_tree(&project_dir) {
                warn!(error = %cleanup, "Failed to remove project directory");
            }
            return Err(e.into());
        }

        info!(path = %project_dir.display(), "Project repository ready");
        Ok(project_dir)
    }
}
