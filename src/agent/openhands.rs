//! OpenHands CLI adapter.
//!
//! OpenHands cannot take its workspace on the command line, so each run
//! rewrites `workspace_base`, `save_trajectory_path` and
//! `log_completions_folder` in the TOML config before launching
//! `<agent_command> -t <prompt> --config-file <config>` from the config's
//! directory.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info};

use super::{AgentRequest, AgentTranscript, CodingAgent};
use crate::config::PipelineConfig;
use crate::error::AgentError;
use crate::utils::tail_chars;

static WORKSPACE_BASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"workspace_base\s*=\s*"[^"]*""#).expect("static regex"));
static TRAJECTORY_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"save_trajectory_path\s*=\s*"[^"]*""#).expect("static regex"));
static COMPLETIONS_FOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"log_completions_folder\s*=\s*"[^"]*""#).expect("static regex")
});

/// Runs OpenHands as a subprocess.
#[derive(Debug, Clone)]
pub struct OpenHandsAgent {
    command: Vec<String>,
    config_path: PathBuf,
    timeout: Option<Duration>,
}

impl OpenHandsAgent {
    pub fn new(command: Vec<String>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            command,
            config_path: config_path.into(),
            timeout: None,
        }
    }

    /// Builds the agent from pipeline configuration.
    ///
    /// Fails when no OpenHands config path is set.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, AgentError> {
        let config_path = config.openhands_config.clone().ok_or_else(|| {
            AgentError::NotConfigured(
                "set OPENHANDS_CONFIG_PATH or pass --openhands-config".to_string(),
            )
        })?;
        Ok(Self::new(config.agent_command.clone(), config_path).with_timeout(config.agent_timeout))
    }

    /// Bounds each run. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    async fn prepare_config(&self, request: &AgentRequest) -> Result<(), AgentError> {
        let content = tokio::fs::read_to_string(&self.config_path).await?;
        let workspace = absolute(&request.working_dir)?;
        let output = request.output_dir.as_deref().map(absolute).transpose()?;
        let rewritten = rewrite_config(&content, &workspace, output.as_deref());
        tokio::fs::write(&self.config_path, rewritten).await?;
        Ok(())
    }
}

#[async_trait]
impl CodingAgent for OpenHandsAgent {
    async fn run(&self, request: &AgentRequest) -> Result<AgentTranscript, AgentError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| AgentError::NotConfigured("agent command is empty".to_string()))?;

        self.prepare_config(request).await?;

        let config_path = absolute(&self.config_path)?;
        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg("-t")
            .arg(&request.prompt)
            .arg("--config-file")
            .arg(&config_path)
            .current_dir(&config_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(
            workspace = %request.working_dir.display(),
            output = ?request.output_dir,
            "Starting OpenHands agent"
        );
        let start = Instant::now();

        let child = cmd.spawn().map_err(|e| AgentError::Spawn {
            command: self.command.join(" "),
            reason: e.to_string(),
        })?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| AgentError::Timeout(limit))??,
            None => child.wait_with_output().await?,
        };

        let duration = start.elapsed();
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(AgentError::Failed {
                code: exit_code,
                stderr: tail_chars(&stderr, 2000).to_string(),
            });
        }

        debug!(duration_secs = duration.as_secs(), stdout = %tail_chars(&stdout, 500), "Agent finished");
        Ok(AgentTranscript::new(exit_code, stdout, stderr, duration))
    }
}

/// Points the OpenHands config at `workspace`, with logs under `output`
/// when given and relative to the config directory otherwise.
pub fn rewrite_config(content: &str, workspace: &Path, output: Option<&Path>) -> String {
    let workspace_line = format!("workspace_base = \"{}\"", workspace.display());
    let (trajectories, completions) = match output {
        Some(dir) => (
            format!("{}/trajectories", dir.display()),
            format!("{}/log_completions", dir.display()),
        ),
        None => ("./trajectories".to_string(), "./log_completions".to_string()),
    };
    let trajectory_line = format!("save_trajectory_path = \"{}\"", trajectories);
    let completions_line = format!("log_completions_folder = \"{}\"", completions);

    let content = WORKSPACE_BASE.replace_all(content, regex::NoExpand(&workspace_line));
    let content = TRAJECTORY_PATH.replace_all(&content, regex::NoExpand(&trajectory_line));
    COMPLETIONS_FOLDER
        .replace_all(&content, regex::NoExpand(&completions_line))
        .into_owned()
}

fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONFIG: &str = r#"[core]
workspace_base = "./workspace"
save_trajectory_path = "old/traj"
[llm]
log_completions = true
log_completions_folder="old/completions"
"#;

    #[test]
    fn test_rewrite_config_with_output_dir() {
        let rewritten = rewrite_config(
            CONFIG,
            Path::new("/runtime/calc_1.1.1_unit_test"),
            Some(Path::new("/runtime/log_1.1.1_unit_test")),
        );
        assert!(rewritten.contains(r#"workspace_base = "/runtime/calc_1.1.1_unit_test""#));
        assert!(rewritten
            .contains(r#"save_trajectory_path = "/runtime/log_1.1.1_unit_test/trajectories""#));
        assert!(rewritten.contains(
            r#"log_completions_folder = "/runtime/log_1.1.1_unit_test/log_completions""#
        ));
        assert!(rewritten.contains("log_completions = true"));
    }

    #[test]
    fn test_rewrite_config_without_output_dir() {
        let rewritten = rewrite_config(CONFIG, Path::new("/w"), None);
        assert!(rewritten.contains(r#"save_trajectory_path = "./trajectories""#));
        assert!(rewritten.contains(r#"log_completions_folder = "./log_completions""#));
    }

    #[test]
    fn test_rewrite_config_keeps_dollar_signs_literal() {
        let rewritten = rewrite_config(CONFIG, Path::new("/w/$1"), None);
        assert!(rewritten.contains(r#"workspace_base = "/w/$1""#));
    }

    #[test]
    fn test_from_config_requires_config_path() {
        let config = PipelineConfig::default();
        let err = OpenHandsAgent::from_config(&config).unwrap_err();
        assert!(matches!(err, AgentError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_run_invokes_command_from_config_dir() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, CONFIG).unwrap();
        let workspace = dir.path().join("work");
        std::fs::create_dir(&workspace).unwrap();

        // `sh -c` binds `-t` to $0 and the prompt to $1.
        let agent = OpenHandsAgent::new(
            vec![
                "sh".to_string(),
                "-c".to_string(),
                "pwd > cwd.txt; echo \"$1\"".to_string(),
            ],
            &config_path,
        );

        let transcript = agent
            .run(&AgentRequest::new("build it", &workspace))
            .await
            .unwrap();
        assert_eq!(transcript.exit_code, 0);
        assert_eq!(transcript.stdout.trim(), "build it");
        assert!(dir.path().join("cwd.txt").exists());

        let config = std::fs::read_to_string(&config_path).unwrap();
        assert!(config.contains(&format!("workspace_base = \"{}\"", workspace.display())));
    }

    #[tokio::test]
    async fn test_run_reports_failure() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, CONFIG).unwrap();

        let agent = OpenHandsAgent::new(
            vec!["sh".to_string(), "-c".to_string(), "echo boom >&2; exit 3".to_string()],
            &config_path,
        );
        let err = agent
            .run(&AgentRequest::new("x", dir.path()))
            .await
            .unwrap_err();
        match err {
            AgentError::Failed { code, stderr } => {
                assert_eq!(code, 3);
                assert!(stderr.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, CONFIG).unwrap();

        let agent = OpenHandsAgent::new(
            vec!["sh".to_string(), "-c".to_string(), "sleep 5".to_string()],
            &config_path,
        )
        .with_timeout(Some(Duration::from_millis(100)));
        let err = agent
            .run(&AgentRequest::new("x", dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Timeout(_)));
    }
}
