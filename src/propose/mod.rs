//! Project creation: proposal, task plan, repository setup, optional
//! container image and unit-test proposal documents.
//!
//! ```ignore
//! use swe_playground::propose::{ProjectPipeline, Proposer, RepoSetup};
//!
//! let pipeline = ProjectPipeline::new(proposer, setup);
//! let created = pipeline.run(Path::new("generated")).await?;
//! println!("{}", created.project_dir.display());
//! ```

pub mod projects;
pub mod setup;
pub mod unit_tests;

use std::path::{Path, PathBuf};

use tracing::info;

use crate::docker::ImageBuilder;
use crate::error::ProposeError;

pub use projects::{parse_projects, save_proposals, ProjectProposal, Proposer};
pub use setup::{starter_name, RepoSetup};

/// Everything produced by one [`ProjectPipeline::run`].
#[derive(Debug, Clone)]
pub struct CreatedProject {
    pub proposal: ProjectProposal,
    pub project_dir: PathBuf,
    pub image_tag: Option<String>,
    pub unit_test_docs: Vec<PathBuf>,
}

/// Runs project proposal through unit-test documentation for one project.
pub struct ProjectPipeline {
    proposer: Proposer,
    setup: RepoSetup,
    image_builder: Option<ImageBuilder>,
}

impl ProjectPipeline {
    pub fn new(proposer: Proposer, setup: RepoSetup) -> Self {
        Self {
            proposer,
            setup,
            image_builder: None,
        }
    }

    /// Builds and publishes the project's image after setup.
    pub fn with_image_builder(mut self, builder: ImageBuilder) -> Self {
        self.image_builder = Some(builder);
        self
    }

    pub async fn run(&self, output_dir: &Path) -> Result<CreatedProject, ProposeError> {
        info!("Step 1: Proposing project");
        let mut proposal = self
            .proposer
            .propose_projects(1)
            .await?
            .into_iter()
            .next()
            .ok_or(ProposeError::NoProposals)?;
        info!(
            repo = %proposal.repo_name,
            language = %proposal.programming_language,
            "Proposed project"
        );

        info!("Step 2: Proposing tasks");
        let tasks = self
            .proposer
            .propose_tasks(&proposal.project_description, &proposal.constraints)
            .await?;

        info!("Step 3: Setting up project repository");
        let project_dir = self.setup.setup(&proposal, &tasks, output_dir).await?;
        proposal.tasks = Some(tasks);

        let image_tag = match &self.image_builder {
            Some(builder) => {
                info!("Step 3.5: Building docker image");
                Some(builder.build_and_publish(&project_dir).await?)
            }
            None => None,
        };

        info!("Step 4: Generating unit test documentation");
        let unit_test_docs = self.proposer.generate_unit_test_docs(&project_dir).await?;

        info!(path = %project_dir.display(), "Project created");
        Ok(CreatedProject {
            proposal,
            project_dir,
            image_tag,
            unit_test_docs,
        })
    }
}
