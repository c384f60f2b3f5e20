//! Build-and-publish loop with agent repair of the Dockerfile.

use std::path::Path;
use std::sync::Arc;

use tera::Context;
use tracing::{info, warn};

use super::backend::ImageBackend;
use crate::agent::{AgentRequest, CodingAgent};
use crate::error::DockerError;
use crate::manifest::load_project_manifest;
use crate::prompts::{PromptId, PromptLibrary};
use crate::utils::tail_chars;

/// Build attempts before giving up.
pub const DEFAULT_BUILD_ATTEMPTS: u32 = 5;

/// Characters of each output stream shown to the repairing agent.
pub const ERROR_TAIL_CHARS: usize = 1000;

/// `<repository>:swe-play_<name lowercased>_<project_id>`
pub fn image_tag(repository: &str, project_name: &str, project_id: &str) -> String {
    format!(
        "{}:swe-play_{}_{}",
        repository,
        project_name.to_lowercase(),
        project_id
    )
}

/// Error summary passed to the dockerfile-fix prompt.
pub fn error_summary(stdout: &str, stderr: &str) -> String {
    format!(
        "stdout:\n{}\nstderr:\n{}",
        tail_chars(stdout, ERROR_TAIL_CHARS),
        tail_chars(stderr, ERROR_TAIL_CHARS)
    )
}

/// Builds a project's image, asking the agent to fix the Dockerfile after
/// each failed build.
pub struct ImageBuilder {
    backend: Arc<dyn ImageBackend>,
    agent: Arc<dyn CodingAgent>,
    prompts: PromptLibrary,
    repository: String,
    max_attempts: u32,
}

impl ImageBuilder {
    pub fn new(
        backend: Arc<dyn ImageBackend>,
        agent: Arc<dyn CodingAgent>,
        prompts: PromptLibrary,
        repository: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            agent,
            prompts,
            repository: repository.into(),
            max_attempts: DEFAULT_BUILD_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Builds the image for the project at `project_dir`, then pushes it and
    /// removes the local copy. Push and removal failures only warn.
    ///
    /// Returns the image tag.
    pub async fn build_and_publish(&self, project_dir: &Path) -> Result<String, DockerError> {
        let dockerfile = project_dir.join("Dockerfile");
        if !dockerfile.is_file() {
            return Err(DockerError::MissingDockerfile(dockerfile));
        }

        let project = load_project_manifest(project_dir)?;
        let name = project
            .project_name
            .as_deref()
            .ok_or(DockerError::MissingProjectField("project_name"))?;
        let id = project
            .project_id
            .as_deref()
            .ok_or(DockerError::MissingProjectField("project_id"))?;
        let tag = image_tag(&self.repository, name, id);

        let mut attempt = 0;
        loop {
            attempt += 1;
            info!(tag = %tag, attempt, "Building docker image");
            let output = self.backend.build(project_dir, &tag).await?;

            if output.success {
                info!(tag = %tag, attempts = attempt, "Docker image built");
                self.publish(&tag).await;
                return Ok(tag);
            }

            let summary = error_summary(&output.stdout, &output.stderr);
            if attempt >= self.max_attempts {
                return Err(DockerError::BuildFailed {
                    attempts: attempt,
                    tail: summary,
                });
            }

            warn!(tag = %tag, attempt, "Docker build failed, asking agent to fix the Dockerfile");
            let mut context = Context::new();
            context.insert("error_msgs", &summary);
            let prompt = self.prompts.render(PromptId::FixDockerfileOpenhands, &context)?;
            self.agent.run(&AgentRequest::new(prompt, project_dir)).await?;
        }
    }

    async fn publish(&self, tag: &str) {
        if let Err(e) = self.backend.push(tag).await {
            warn!(tag, error = %e, "Failed to push image, continuing without push");
            return;
        }
        info!(tag, "Image pushed");
        match self.backend.remove(tag).await {
            Ok(()) => info!(tag, "Removed local image"),
            Err(e) => warn!(tag, error = %e, "Failed to remove local image"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentTranscript;
    use crate::docker::BuildOutput;
    use crate::error::AgentError;
    use crate::manifest::{save_manifest, Project};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Fails the first `failures` builds; records every call.
    struct ScriptedBackend {
        failures: u32,
        push_fails: bool,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                push_fails: false,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ImageBackend for ScriptedBackend {
        async fn build(&self, _context_dir: &Path, tag: &str) -> Result<BuildOutput, DockerError> {
            let mut calls = self.calls.lock().unwrap();
            let builds = calls.iter().filter(|c| c.starts_with("build")).count() as u32;
            calls.push(format!("build {}", tag));
            if builds < self.failures {
                Ok(BuildOutput::failed("x".repeat(1500), "missing package"))
            } else {
                Ok(BuildOutput::succeeded())
            }
        }

        async fn push(&self, tag: &str) -> Result<(), DockerError> {
            self.calls.lock().unwrap().push(format!("push {}", tag));
            if self.push_fails {
                return Err(DockerError::Command("denied".to_string()));
            }
            Ok(())
        }

        async fn remove(&self, tag: &str) -> Result<(), DockerError> {
            self.calls.lock().unwrap().push(format!("rmi {}", tag));
            Ok(())
        }
    }

    #[derive(Default)]
    struct PromptRecorder {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CodingAgent for PromptRecorder {
        async fn run(&self, request: &AgentRequest) -> Result<AgentTranscript, AgentError> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            Ok(AgentTranscript::default())
        }
    }

    fn project(root: &Path) -> std::path::PathBuf {
        let dir = root.join("calc");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Dockerfile"), "FROM python:3.12").unwrap();
        save_manifest(
            &dir.join("tasks.json"),
            &Project {
                project_name: Some("Calc".to_string()),
                project_id: Some("1700000000".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_image_tag_and_summary() {
        assert_eq!(
            image_tag("me/swe-playground", "MyRepo", "42"),
            "me/swe-playground:swe-play_myrepo_42"
        );
        let summary = error_summary(&"a".repeat(1200), "boom");
        assert_eq!(summary, format!("stdout:\n{}\nstderr:\nboom", "a".repeat(1000)));
    }

    #[tokio::test]
    async fn test_fix_loop_then_publish() {
        let root = TempDir::new().unwrap();
        let dir = project(root.path());
        let backend = Arc::new(ScriptedBackend::new(2));
        let agent = Arc::new(PromptRecorder::default());
        let builder = ImageBuilder::new(backend.clone(), agent.clone(), PromptLibrary::builtin(), "repo");

        let tag = builder.build_and_publish(&dir).await.unwrap();
        assert_eq!(tag, "repo:swe-play_calc_1700000000");
        assert_eq!(
            *backend.calls.lock().unwrap(),
            vec![
                format!("build {tag}"),
                format!("build {tag}"),
                format!("build {tag}"),
                format!("push {tag}"),
                format!("rmi {tag}"),
            ]
        );
        let prompts = agent.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("missing package"));
        assert!(!prompts[0].contains(&"x".repeat(1001)));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let root = TempDir::new().unwrap();
        let dir = project(root.path());
        let backend = Arc::new(ScriptedBackend::new(10));
        let agent = Arc::new(PromptRecorder::default());
        let builder = ImageBuilder::new(backend.clone(), agent.clone(), PromptLibrary::builtin(), "repo");

        let err = builder.build_and_publish(&dir).await.unwrap_err();
        assert!(matches!(err, DockerError::BuildFailed { attempts: 5, .. }));
        assert_eq!(agent.prompts.lock().unwrap().len(), 4);
        assert!(backend
            .calls
            .lock()
            .unwrap()
            .iter()
            .all(|c| c.starts_with("build")));
    }

    #[tokio::test]
    async fn test_push_failure_only_warns() {
        let root = TempDir::new().unwrap();
        let dir = project(root.path());
        let backend = Arc::new(ScriptedBackend {
            push_fails: true,
            ..ScriptedBackend::new(0)
        });
        let builder = ImageBuilder::new(
            backend.clone(),
            Arc::new(PromptRecorder::default()),
            PromptLibrary::builtin(),
            "repo",
        );

        assert!(builder.build_and_publish(&dir).await.is_ok());
        assert_eq!(backend.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_dockerfile() {
        let root = TempDir::new().unwrap();
        let builder = ImageBuilder::new(
            Arc::new(ScriptedBackend::new(0)),
            Arc::new(PromptRecorder::default()),
            PromptLibrary::builtin(),
            "repo",
        );
        assert!(matches!(
            builder.build_and_publish(root.path()).await,
            Err(DockerError::MissingDockerfile(_))
        ));
    }
}
