//! Pipeline configuration.
//!
//! Settings shared by the proposal, rollout, variant synthesis and image
//! build stages: LLM options, retry bounds, the coding agent invocation and
//! filesystem locations. Values come from [`Default`], are overridden by
//! environment variables in [`PipelineConfig::from_env`], and finally by CLI
//! flags through the `with_*` builders.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Default command used to launch the OpenHands agent.
pub const DEFAULT_AGENT_COMMAND: &str = "poetry run python -m openhands.core.main";

/// Configuration for the whole pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // LLM settings
    /// Model used for project, task, unit-test and issue proposals.
    pub model: String,
    /// Sampling temperature for every generation call.
    pub temperature: f64,

    // Retry settings
    /// Attempts per task in the rollout and in each variant retry loop.
    pub max_attempts: u32,
    /// Docker builds attempted before giving up.
    pub docker_fix_attempts: u32,

    // Agent settings
    /// Upper bound on a single agent run. `None` waits indefinitely.
    pub agent_timeout: Option<Duration>,
    /// Program and leading arguments used to launch the agent.
    pub agent_command: Vec<String>,
    /// OpenHands TOML config rewritten before each run.
    pub openhands_config: Option<PathBuf>,

    // Test execution
    /// Shell that runs `tests/<task>.sh`.
    pub test_shell: String,
    /// Python interpreter that runs pytest.
    pub python: String,

    // Locations
    /// Directory of `<name>.jinja` files overriding built-in prompts.
    pub prompts_dir: Option<PathBuf>,
    /// Directory holding one starter template per programming language.
    pub starters_dir: PathBuf,
    /// Image repository that built project images are tagged under.
    pub image_repository: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            temperature: 0.7,

            max_attempts: 3,
            docker_fix_attempts: 5,

            agent_timeout: None,
            agent_command: split_command(DEFAULT_AGENT_COMMAND),
            openhands_config: None,

            test_shell: "bash".to_string(),
            python: "python".to_string(),

            prompts_dir: None,
            starters_dir: PathBuf::from("./repo_starter"),
            image_repository: "swe-playground".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SWE_PLAY_MODEL`: LLM model (default: claude-sonnet-4-20250514)
    /// - `SWE_PLAY_TEMPERATURE`: LLM temperature (default: 0.7)
    /// - `SWE_PLAY_MAX_ATTEMPTS`: Attempts per task (default: 3)
    /// - `SWE_PLAY_DOCKER_FIX_ATTEMPTS`: Docker builds before failing (default: 5)
    /// - `SWE_PLAY_AGENT_TIMEOUT_SECS`: Agent timeout in seconds (default: none)
    /// - `SWE_PLAY_AGENT_COMMAND`: Whitespace-separated agent launcher
    /// - `OPENHANDS_CONFIG_PATH`: OpenHands config file
    /// - `SWE_PLAY_TEST_SHELL`: Shell for task test scripts (default: bash)
    /// - `SWE_PLAY_PYTHON`: Python interpreter for pytest (default: python)
    /// - `SWE_PLAY_PROMPTS_DIR`: Prompt override directory
    /// - `SWE_PLAY_STARTERS_DIR`: Starter template root (default: ./repo_starter)
    /// - `SWE_PLAY_IMAGE_REPOSITORY`: Image repository (default: swe-playground)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("SWE_PLAY_MODEL") {
            config.model = val;
        }

        if let Ok(val) = std::env::var("SWE_PLAY_TEMPERATURE") {
            config.temperature = parse_env_value(&val, "SWE_PLAY_TEMPERATURE")?;
        }

        if let Ok(val) = std::env::var("SWE_PLAY_MAX_ATTEMPTS") {
            config.max_attempts = parse_env_value(&val, "SWE_PLAY_MAX_ATTEMPTS")?;
        }

        if let Ok(val) = std::env::var("SWE_PLAY_DOCKER_FIX_ATTEMPTS") {
            config.docker_fix_attempts = parse_env_value(&val, "SWE_PLAY_DOCKER_FIX_ATTEMPTS")?;
        }

        if let Ok(val) = std::env::var("SWE_PLAY_AGENT_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "SWE_PLAY_AGENT_TIMEOUT_SECS")?;
            config.agent_timeout = Some(Duration::from_secs(secs));
        }

        if let Ok(val) = std::env::var("SWE_PLAY_AGENT_COMMAND") {
            config.agent_command = split_command(&val);
        }

        if let Ok(val) = std::env::var("OPENHANDS_CONFIG_PATH") {
            config.openhands_config = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("SWE_PLAY_TEST_SHELL") {
            config.test_shell = val;
        }

        if let Ok(val) = std::env::var("SWE_PLAY_PYTHON") {
            config.python = val;
        }

        if let Ok(val) = std::env::var("SWE_PLAY_PROMPTS_DIR") {
            config.prompts_dir = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("SWE_PLAY_STARTERS_DIR") {
            config.starters_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("SWE_PLAY_IMAGE_REPOSITORY") {
            config.image_repository = val;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model cannot be empty".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationFailed(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.max_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.docker_fix_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "docker_fix_attempts must be greater than 0".to_string(),
            ));
        }

        if matches!(self.agent_timeout, Some(t) if t.is_zero()) {
            return Err(ConfigError::ValidationFailed(
                "agent_timeout must be greater than 0 when set".to_string(),
            ));
        }

        if self.agent_command.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "agent_command cannot be empty".to_string(),
            ));
        }

        if self.test_shell.trim().is_empty() || self.python.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "test_shell and python cannot be empty".to_string(),
            ));
        }

        if self.image_repository.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "image_repository cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder method to set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Builder method to set temperature.
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    /// Builder method to set the attempt bound.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Builder method to set the docker build bound.
    pub fn with_docker_fix_attempts(mut self, attempts: u32) -> Self {
        self.docker_fix_attempts = attempts;
        self
    }

    /// Builder method to set the agent timeout.
    pub fn with_agent_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.agent_timeout = timeout;
        self
    }

    /// Builder method to set the OpenHands config path.
    pub fn with_openhands_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.openhands_config = Some(path.into());
        self
    }

    /// Builder method to set the interpreters used by the test runner.
    pub fn with_test_interpreters(
        mut self,
        shell: impl Into<String>,
        python: impl Into<String>,
    ) -> Self {
        self.test_shell = shell.into();
        self.python = python.into();
        self
    }

    /// Builder method to set the prompt override directory.
    pub fn with_prompts_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.prompts_dir = Some(path.into());
        self
    }

    /// Builder method to set the starter template root.
    pub fn with_starters_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.starters_dir = path.into();
        self
    }

    /// Builder method to set the image repository.
    pub fn with_image_repository(mut self, repo: impl Into<String>) -> Self {
        self.image_repository = repo.into();
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

fn split_command(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.model, "claude-sonnet-4-20250514");
        assert!((config.temperature - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.docker_fix_attempts, 5);
        assert!(config.agent_timeout.is_none());
        assert_eq!(
            config.agent_command,
            vec!["poetry", "run", "python", "-m", "openhands.core.main"]
        );
        assert!(config.openhands_config.is_none());
        assert_eq!(config.test_shell, "bash");
        assert_eq!(config.python, "python");
    }

    #[test]
    fn test_config_builder() {
        let config = PipelineConfig::new()
            .with_model("gpt-4o")
            .with_temperature(0.2)
            .with_max_attempts(5)
            .with_agent_timeout(Some(Duration::from_secs(600)))
            .with_openhands_config("/opt/openhands/config.toml")
            .with_image_repository("registry.local/play");

        assert_eq!(config.model, "gpt-4o");
        assert!((config.temperature - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.agent_timeout, Some(Duration::from_secs(600)));
        assert_eq!(
            config.openhands_config,
            Some(PathBuf::from("/opt/openhands/config.toml"))
        );
        assert_eq!(config.image_repository, "registry.local/play");
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_zero_attempts() {
        let result = PipelineConfig::default().with_max_attempts(0).validate();
        assert!(result.unwrap_err().to_string().contains("max_attempts"));
    }

    #[test]
    fn test_validation_invalid_temperature() {
        let result = PipelineConfig::default().with_temperature(3.0).validate();
        assert!(result.unwrap_err().to_string().contains("temperature"));
    }

    #[test]
    fn test_validation_zero_timeout() {
        let result = PipelineConfig::default()
            .with_agent_timeout(Some(Duration::ZERO))
            .validate();
        assert!(result.unwrap_err().to_string().contains("agent_timeout"));
    }

    #[test]
    fn test_validation_empty_interpreter() {
        let result = PipelineConfig::default()
            .with_test_interpreters("bash", " ")
            .validate();
        assert!(result.unwrap_err().to_string().contains("python"));
    }

    #[test]
    fn test_parse_env_value() {
        let attempts: u32 = parse_env_value(" 4 ", "KEY").unwrap();
        assert_eq!(attempts, 4);

        let err = parse_env_value::<u32>("four", "SWE_PLAY_MAX_ATTEMPTS").unwrap_err();
        assert!(err.to_string().contains("SWE_PLAY_MAX_ATTEMPTS"));
    }

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("  my-agent   --fast "), vec!["my-agent", "--fast"]);
        assert!(split_command("   ").is_empty());
    }
}
