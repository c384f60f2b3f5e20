//! Container image operations behind a trait, with a `docker` CLI backend.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::DockerError;

/// Captured output of one image build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl BuildOutput {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failed(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

/// Builds, publishes and removes images.
///
/// A failing build is reported through [`BuildOutput::success`]; `Err` is
/// reserved for not being able to run the build at all.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn build(&self, context_dir: &Path, tag: &str) -> Result<BuildOutput, DockerError>;

    async fn push(&self, tag: &str) -> Result<(), DockerError>;

    async fn remove(&self, tag: &str) -> Result<(), DockerError>;
}

/// Shells out to the `docker` executable.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
        }
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    async fn output(&self, args: &[&str], cwd: Option<&Path>) -> Result<std::process::Output, DockerError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        debug!(program = %self.program, ?args, "Running docker command");
        cmd.output()
            .await
            .map_err(|e| DockerError::Command(format!("{} {}: {}", self.program, args.join(" "), e)))
    }

    async fn checked(&self, args: &[&str]) -> Result<(), DockerError> {
        let output = self.output(args, None).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(DockerError::Command(format!(
                "{} {} exited with {}: {}",
                self.program,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

#[async_trait]
impl ImageBackend for DockerCli {
    async fn build(&self, context_dir: &Path, tag: &str) -> Result<BuildOutput, DockerError> {
        let output = self.output(&["build", "-t", tag, "."], Some(context_dir)).await?;
        Ok(BuildOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn push(&self, tag: &str) -> Result<(), DockerError> {
        self.checked(&["push", tag]).await
    }

    async fn remove(&self, tag: &str) -> Result<(), DockerError> {
        self.checked(&["rmi", tag]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_build_reports_exit_status() {
        let dir = TempDir::new().unwrap();
        // `echo` stands in for docker: it succeeds and echoes the arguments.
        let cli = DockerCli::new().with_program("echo");
        let output = cli.build(dir.path(), "repo:tag").await.unwrap();
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "build -t repo:tag .");
    }

    #[tokio::test]
    async fn test_checked_command_failure() {
        let cli = DockerCli::new().with_program("false");
        assert!(matches!(
            cli.push("repo:tag").await,
            Err(DockerError::Command(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = TempDir::new().unwrap();
        let cli = DockerCli::new().with_program("definitely-not-a-docker-binary");
        assert!(matches!(
            cli.build(dir.path(), "repo:tag").await,
            Err(DockerError::Command(_))
        ));
    }
}
