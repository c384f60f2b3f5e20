//! CLI command definitions for swe-playground.
//!
//! Every pipeline stage is a subcommand. Shared settings come from
//! [`PipelineConfig::from_env`] and are overridden by the global flags.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tracing::{error, info, warn};

use crate::agent::{CodingAgent, OpenHandsAgent};
use crate::config::PipelineConfig;
use crate::docker::{DockerCli, ImageBuilder};
use crate::llm::{LiteLlmClient, TextGenerator};
use crate::manifest::{convert_markdown, load_manifest, ManifestEnvelope};
use crate::prompts::PromptLibrary;
use crate::propose::{save_proposals, ProjectPipeline, ProjectProposal, Proposer, RepoSetup};
use crate::rollout::{RolloutMachine, RuntimeLayout, ScriptTestExecutor, TestExecutor};
use crate::synth::{Commit0Builder, IssueProposer, VariantKind, VariantSynthesizer};
use crate::trajectory::convert_log;

/// Default folder under which rollout runtime directories are created.
const DEFAULT_RUNTIME_FOLDER: &str = "./runtime";

/// Default folder for generated projects.
const DEFAULT_OUTPUT_DIR: &str = "./generated";

/// Synthetic software-engineering benchmark generator.
#[derive(Parser)]
#[command(name = "swe-playground")]
#[command(about = "Propose projects, roll them out task by task with a coding agent, and derive benchmark variants")]
#[command(version)]
#[command(
    long_about = "swe-playground proposes software projects with an LLM, has a coding agent implement them task by task under a growing test suite, and derives SWE-bench, SWT-Bench and Commit-0 style variants from the accepted checkpoints.\n\nExample usage:\n  swe-playground create-project --output ./generated\n  swe-playground rollout --project-dir ./generated/calc --swe --swt --commit0"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Model used for every LLM call (overrides SWE_PLAY_MODEL).
    #[arg(short = 'm', long, global = true)]
    pub model: Option<String>,

    /// OpenHands config file (overrides OPENHANDS_CONFIG_PATH).
    #[arg(long, global = true)]
    pub openhands_config: Option<PathBuf>,

    /// Directory of `<prompt-name>.jinja` overrides (overrides SWE_PLAY_PROMPTS_DIR).
    #[arg(long, global = true)]
    pub prompts_dir: Option<PathBuf>,

    /// Upper bound on one agent run, in seconds.
    #[arg(long, global = true)]
    pub agent_timeout: Option<u64>,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Propose one project, plan its tasks, set up its repository and
    /// write unit-test proposal documents.
    #[command(alias = "create")]
    CreateProject(CreateProjectArgs),

    /// Propose projects and save each as `<repo_name>.json`.
    ProposeProjects(ProposeProjectsArgs),

    /// Propose the task plan for a saved project proposal.
    ProposeTasks(ProjectFileArgs),

    /// Set up a repository from a saved project proposal with tasks.
    SetupRepo(SetupRepoArgs),

    /// Convert a markdown task plan to JSON and print its summary.
    ConvertPlan(ConvertPlanArgs),

    /// Roll out every task of a project with the coding agent.
    Rollout(RolloutArgs),

    /// Generate SWE-bench style fix variants from an accepted rollout.
    Swe(VariantArgs),

    /// Generate SWT-Bench style reproduce variants from an accepted rollout.
    Swt(VariantArgs),

    /// Generate Commit-0 style whole-repository variants.
    Commit0(Commit0Args),

    /// Build and publish a project's docker image.
    DockerBuild(DockerBuildArgs),

    /// Convert an agent log directory into a trajectory record.
    ConvertTrajectory(ConvertTrajectoryArgs),
}

#[derive(Parser, Debug)]
pub struct CreateProjectArgs {
    /// Folder the project repository is created in.
    #[arg(short = 'o', long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output: PathBuf,

    /// Build and publish a docker image after setup.
    #[arg(long)]
    pub docker: bool,
}

#[derive(Parser, Debug)]
pub struct ProposeProjectsArgs {
    /// Number of projects to propose.
    #[arg(short = 'n', long, default_value = "1")]
    pub num_projects: usize,

    /// Folder to save proposals in; proposals are only logged when absent.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ProjectFileArgs {
    /// Project proposal JSON file.
    #[arg(short = 'p', long)]
    pub project_file: PathBuf,
}

#[derive(Parser, Debug)]
pub struct SetupRepoArgs {
    /// Project proposal JSON file with proposed tasks.
    #[arg(short = 'p', long)]
    pub project_file: PathBuf,

    /// Folder the project repository is created in.
    #[arg(short = 'o', long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output: PathBuf,

    /// Build and publish a docker image after setup.
    #[arg(long)]
    pub docker: bool,
}

#[derive(Parser, Debug)]
pub struct ConvertPlanArgs {
    /// Markdown task plan.
    #[arg(short = 'i', long)]
    pub input: PathBuf,

    /// Output JSON manifest.
    #[arg(short = 'o', long)]
    pub output: PathBuf,
}

#[derive(Parser, Debug)]
pub struct RolloutArgs {
    /// Project repository with tasks.json and tests/.
    #[arg(short = 'p', long)]
    pub project_dir: PathBuf,

    /// Folder in which a new `runtime_<timestamp>` directory is created.
    #[arg(long, default_value = DEFAULT_RUNTIME_FOLDER)]
    pub runtime_folder: PathBuf,

    /// Existing runtime directory to resume instead of starting a new one.
    #[arg(long)]
    pub runtime_dir: Option<PathBuf>,

    /// Generate fix variants after the rollout.
    #[arg(long)]
    pub swe: bool,

    /// Generate reproduce variants after the rollout.
    #[arg(long)]
    pub swt: bool,

    /// Generate Commit-0 variants after the rollout.
    #[arg(long)]
    pub commit0: bool,

    /// Commit-0 iterations when `--commit0` is set.
    #[arg(long, default_value = "1")]
    pub commit0_iterations: u32,
}

#[derive(Parser, Debug)]
pub struct VariantArgs {
    /// Project repository the rollout was run on.
    #[arg(short = 'p', long)]
    pub project_dir: PathBuf,

    /// Runtime directory of the accepted rollout.
    #[arg(short = 'r', long)]
    pub runtime_dir: PathBuf,
}

#[derive(Parser, Debug)]
pub struct Commit0Args {
    #[command(flatten)]
    pub variant: VariantArgs,

    /// Number of independent completion attempts.
    #[arg(long, default_value = "1")]
    pub iterations: u32,
}

#[derive(Parser, Debug)]
pub struct DockerBuildArgs {
    /// Project repository with a Dockerfile and tasks.json.
    #[arg(short = 'p', long)]
    pub project_dir: PathBuf,
}

#[derive(Parser, Debug)]
pub struct ConvertTrajectoryArgs {
    /// Agent output directory containing `log_completions/`.
    #[arg(long)]
    pub log_dir: PathBuf,

    /// Directory the record is written to.
    #[arg(short = 'o', long)]
    pub output_dir: PathBuf,

    /// Record key; the file is `<key>.json`.
    #[arg(short = 'k', long)]
    pub key: String,
}

/// Parse CLI arguments without running any command.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse CLI arguments and run the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with already parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::CreateProject(args) => run_create_project_command(&config, args).await,
        Commands::ProposeProjects(args) => run_propose_projects_command(&config, args).await,
        Commands::ProposeTasks(args) => run_propose_tasks_command(&config, args).await,
        Commands::SetupRepo(args) => run_setup_repo_command(&config, args).await,
        Commands::ConvertPlan(args) => run_convert_plan_command(args),
        Commands::Rollout(args) => run_rollout_command(&config, args).await,
        Commands::Swe(args) => run_variant_command(&config, VariantKind::Fix, args).await,
        Commands::Swt(args) => run_variant_command(&config, VariantKind::Reproduce, args).await,
        Commands::Commit0(args) => run_commit0_command(&config, args).await,
        Commands::DockerBuild(args) => run_docker_build_command(&config, args).await,
        Commands::ConvertTrajectory(args) => run_convert_trajectory_command(args).await,
    }
}

// ============================================================================
// Wiring
// ============================================================================

fn load_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = PipelineConfig::from_env()?;
    if let Some(model) = &cli.model {
        config = config.with_model(model.clone());
    }
    if let Some(path) = &cli.openhands_config {
        config = config.with_openhands_config(path.clone());
    }
    if let Some(path) = &cli.prompts_dir {
        config = config.with_prompts_dir(path.clone());
    }
    if let Some(secs) = cli.agent_timeout {
        config = config.with_agent_timeout(Some(Duration::from_secs(secs)));
    }
    config.validate()?;
    Ok(config)
}

fn prompt_library(config: &PipelineConfig) -> anyhow::Result<PromptLibrary> {
    Ok(PromptLibrary::new(config.prompts_dir.as_deref())?)
}

fn text_generator(config: &PipelineConfig) -> anyhow::Result<TextGenerator> {
    let client = LiteLlmClient::from_env(config.model.clone())
        .context("LLM endpoint is not configured; set OPENAI_BASE_URL or LITELLM_API_BASE")?;
    info!(model = %config.model, api_base = client.api_base(), "Using LLM endpoint");
    if !client.has_api_key() {
        warn!("No API key set (OPENAI_API_KEY or LITELLM_API_KEY); sending unauthenticated requests");
    }
    Ok(TextGenerator::new(Arc::new(client), config.model.clone()).with_temperature(config.temperature))
}

fn coding_agent(config: &PipelineConfig) -> anyhow::Result<Arc<dyn CodingAgent>> {
    Ok(Arc::new(OpenHandsAgent::from_config(config)?))
}

fn test_executor(config: &PipelineConfig) -> Arc<dyn TestExecutor> {
    Arc::new(ScriptTestExecutor::from_config(config))
}

fn image_builder(
    config: &PipelineConfig,
    agent: Arc<dyn CodingAgent>,
    prompts: PromptLibrary,
) -> ImageBuilder {
    ImageBuilder::new(
        Arc::new(DockerCli::new()),
        agent,
        prompts,
        config.image_repository.clone(),
    )
    .with_max_attempts(config.docker_fix_attempts)
}

/// Runtime layouts are keyed by the project directory's name.
fn project_name(project_dir: &Path) -> anyhow::Result<String> {
    let canonical = project_dir
        .canonicalize()
        .with_context(|| format!("Project directory not found: {}", project_dir.display()))?;
    canonical
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow::anyhow!("Project directory has no name: {}", project_dir.display()))
}

fn existing_layout(project_dir: &Path, runtime_dir: &Path) -> anyhow::Result<RuntimeLayout> {
    if !runtime_dir.is_dir() {
        anyhow::bail!("Runtime directory not found: {}", runtime_dir.display());
    }
    let layout = RuntimeLayout::new(runtime_dir, project_name(project_dir)?);
    layout.ensure()?;
    Ok(layout)
}

// ============================================================================
// Project creation
// ============================================================================

async fn run_create_project_command(
    config: &PipelineConfig,
    args: CreateProjectArgs,
) -> anyhow::Result<()> {
    let prompts = prompt_library(config)?;
    let agent = coding_agent(config)?;
    let proposer = Proposer::new(text_generator(config)?, prompts.clone());
    let setup = RepoSetup::new(agent.clone(), prompts.clone(), config.starters_dir.clone());

    let mut pipeline = ProjectPipeline::new(proposer, setup);
    if args.docker {
        pipeline = pipeline.with_image_builder(image_builder(config, agent, prompts));
    }

    let created = pipeline.run(&args.output).await?;
    println!("Project:    {}", created.proposal.project_description);
    println!("Repository: {}", created.proposal.repo_name);
    println!("Path:       {}", created.project_dir.display());
    if let Some(tag) = created.image_tag {
        println!("Image:      {}", tag);
    }
    Ok(())
}

async fn run_propose_projects_command(
    config: &PipelineConfig,
    args: ProposeProjectsArgs,
) -> anyhow::Result<()> {
    let proposer = Proposer::new(text_generator(config)?, prompt_library(config)?);
    let proposals = proposer.propose_projects(args.num_projects).await?;

    for proposal in &proposals {
        info!(
            repo = %proposal.repo_name,
            language = %proposal.programming_language,
            "Proposed project"
        );
    }
    if let Some(output) = &args.output {
        let paths = save_proposals(&proposals, output)?;
        println!("Saved {} proposals to {}", paths.len(), output.display());
    } else {
        println!("{}", serde_json::to_string_pretty(&proposals)?);
    }
    Ok(())
}

async fn run_propose_tasks_command(
    config: &PipelineConfig,
    args: ProjectFileArgs,
) -> anyhow::Result<()> {
    let mut proposal = ProjectProposal::load(&args.project_file)
        .with_context(|| format!("Failed to load project file {}", args.project_file.display()))?;
    let proposer = Proposer::new(text_generator(config)?, prompt_library(config)?);

    let tasks = proposer
        .propose_tasks(&proposal.project_description, &proposal.constraints)
        .await?;
    proposal.tasks = Some(tasks);
    proposal.save(&args.project_file)?;
    println!("Tasks saved to {}", args.project_file.display());
    Ok(())
}

async fn run_setup_repo_command(config: &PipelineConfig, args: SetupRepoArgs) -> anyhow::Result<()> {
    let proposal = ProjectProposal::load(&args.project_file)
        .with_context(|| format!("Failed to load project file {}", args.project_file.display()))?;
    let Some(tasks) = proposal.tasks.clone() else {
        anyhow::bail!(
            "Project file {} has no tasks; run propose-tasks first",
            args.project_file.display()
        );
    };

    let prompts = prompt_library(config)?;
    let agent = coding_agent(config)?;
    let setup = RepoSetup::new(agent.clone(), prompts.clone(), config.starters_dir.clone());
    let project_dir = setup.setup(&proposal, &tasks, &args.output).await?;

    if args.docker {
        let tag = image_builder(config, agent, prompts.clone())
            .build_and_publish(&project_dir)
            .await?;
        println!("Image: {}", tag);
    }

    let proposer = Proposer::new(text_generator(config)?, prompts);
    proposer.generate_unit_test_docs(&project_dir).await?;
    println!("Project repository set up at {}", project_dir.display());
    Ok(())
}

fn run_convert_plan_command(args: ConvertPlanArgs) -> anyhow::Result<()> {
    // Re-converting keeps the envelope stamped during repository setup.
    let envelope = load_manifest(&args.output)
        .ok()
        .map(|p| ManifestEnvelope {
            project_name: p.project_name,
            project_id: p.project_id,
            constraints: p.constraints,
        })
        .unwrap_or_default();

    let project = convert_markdown(&args.input, &args.output, envelope)?;
    println!("Parsed {}", project.summary());
    Ok(())
}

// ============================================================================
// Rollout and variants
// ============================================================================

async fn run_rollout_command(config: &PipelineConfig, args: RolloutArgs) -> anyhow::Result<()> {
    let layout = match &args.runtime_dir {
        Some(dir) => {
            info!(path = %dir.display(), "Resuming runtime directory");
            let layout = RuntimeLayout::new(dir, project_name(&args.project_dir)?);
            layout.ensure()?;
            layout
        }
        None => RuntimeLayout::create(&args.runtime_folder, &project_name(&args.project_dir)?)?,
    };

    let prompts = prompt_library(config)?;
    let agent = coding_agent(config)?;
    let executor = test_executor(config);

    let machine = RolloutMachine::new(agent.clone(), executor.clone(), prompts.clone())
        .with_max_attempts(config.max_attempts);
    let report = machine.run(&args.project_dir, &layout).await?;
    println!(
        "Rollout accepted {} tasks in {}",
        report.completed.len(),
        report.runtime_dir.display()
    );

    let variants = [
        (args.swe, VariantKind::Fix),
        (args.swt, VariantKind::Reproduce),
    ];
    for (enabled, kind) in variants {
        if !enabled {
            continue;
        }
        let result = async {
            let synth = variant_synthesizer(config, kind, agent.clone(), executor.clone(), &prompts)?;
            Ok::<_, anyhow::Error>(synth.run(&args.project_dir, &layout).await?)
        }
        .await;
        match result {
            Ok(report) => println!("{}: {} tasks converted", kind, report.completed.len()),
            Err(e) => error!(variant = %kind, error = %e, "Variant generation failed"),
        }
    }

    if args.commit0 {
        let builder = Commit0Builder::new(agent, prompts);
        match builder
            .run(&args.project_dir, &layout, args.commit0_iterations)
            .await
        {
            Ok(report) => println!("Commit0: {} trajectories converted", report.converted.len()),
            Err(e) => error!(error = %e, "Commit0 generation failed"),
        }
    }
    Ok(())
}

fn variant_synthesizer(
    config: &PipelineConfig,
    kind: VariantKind,
    agent: Arc<dyn CodingAgent>,
    executor: Arc<dyn TestExecutor>,
    prompts: &PromptLibrary,
) -> anyhow::Result<VariantSynthesizer> {
    let proposer = IssueProposer::new(text_generator(config)?, prompts.clone());
    Ok(VariantSynthesizer::new(kind, agent, executor, proposer, prompts.clone())
        .with_max_attempts(config.max_attempts))
}

async fn run_variant_command(
    config: &PipelineConfig,
    kind: VariantKind,
    args: VariantArgs,
) -> anyhow::Result<()> {
    let layout = existing_layout(&args.project_dir, &args.runtime_dir)?;
    let prompts = prompt_library(config)?;
    let synth = variant_synthesizer(config, kind, coding_agent(config)?, test_executor(config), &prompts)?;

    let report = synth.run(&args.project_dir, &layout).await?;
    for (task, reason) in &report.failed {
        warn!(task = %task, reason = %reason, "Task failed");
    }
    println!(
        "{}: {} converted, {} skipped, {} abandoned, {} failed",
        kind,
        report.completed.len(),
        report.skipped.len(),
        report.abandoned.len(),
        report.failed.len()
    );
    Ok(())
}

async fn run_commit0_command(config: &PipelineConfig, args: Commit0Args) -> anyhow::Result<()> {
    let layout = existing_layout(&args.variant.project_dir, &args.variant.runtime_dir)?;
    let builder = Commit0Builder::new(coding_agent(config)?, prompt_library(config)?);

    let report = builder
        .run(&args.variant.project_dir, &layout, args.iterations)
        .await?;
    match &report.source_task {
        Some(task) => println!(
            "Commit0 from task {}: {} converted, {} failed",
            task,
            report.converted.len(),
            report.failed.len()
        ),
        None => println!("Commit0: no task with an accepted rollout"),
    }
    Ok(())
}

// ============================================================================
// Utilities
// ============================================================================

async fn run_docker_build_command(
    config: &PipelineConfig,
    args: DockerBuildArgs,
) -> anyhow::Result<()> {
    let builder = image_builder(config, coding_agent(config)?, prompt_library(config)?);
    let tag = builder.build_and_publish(&args.project_dir).await?;
    println!("Image: {}", tag);
    Ok(())
}

async fn run_convert_trajectory_command(args: ConvertTrajectoryArgs) -> anyhow::Result<()> {
    let path = convert_log(&args.log_dir, &args.output_dir, &args.key).await?;
    println!("Trajectory written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::load_project_manifest;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_rollout_defaults() {
        let cli = Cli::try_parse_from(["swe-playground", "rollout", "-p", "calc"]).expect("should parse");
        assert_eq!(cli.log_level, "info");
        match cli.command {
            Commands::Rollout(args) => {
                assert_eq!(args.project_dir, PathBuf::from("calc"));
                assert_eq!(args.runtime_folder, PathBuf::from(DEFAULT_RUNTIME_FOLDER));
                assert!(args.runtime_dir.is_none());
                assert!(!args.swe && !args.swt && !args.commit0);
                assert_eq!(args.commit0_iterations, 1);
            }
            _ => panic!("Expected Rollout command"),
        }
    }

    #[test]
    fn test_global_overrides_after_subcommand() {
        let cli = Cli::try_parse_from([
            "swe-playground",
            "swt",
            "-p",
            "calc",
            "-r",
            "runtime/runtime_1",
            "--model",
            "gpt-4o",
            "--openhands-config",
            "oh.toml",
            "--log-level",
            "debug",
        ])
        .expect("should parse");
        assert_eq!(cli.model.as_deref(), Some("gpt-4o"));
        assert_eq!(cli.openhands_config, Some(PathBuf::from("oh.toml")));
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Commands::Swt(_)));
    }

    #[test]
    fn test_commit0_iterations() {
        let cli = Cli::try_parse_from([
            "swe-playground",
            "commit0",
            "-p",
            "calc",
            "-r",
            "rt",
            "--iterations",
            "3",
        ])
        .expect("should parse");
        match cli.command {
            Commands::Commit0(args) => {
                assert_eq!(args.iterations, 3);
                assert_eq!(args.variant.runtime_dir, PathBuf::from("rt"));
            }
            _ => panic!("Expected Commit0 command"),
        }
    }

    #[test]
    fn test_convert_plan_command() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("tasks.md");
        std::fs::write(
            &input,
            "# Project Description\nA calculator\n\n# Detailed Documentation\n\n\
             ## Phase 1: Core\n### Module 1.1: Parser\n#### Task 1.1.1: Tokenize\n\
             - **Description:** Split input\n",
        )
        .unwrap();
        let output = dir.path().join("tasks.json");

        run_convert_plan_command(ConvertPlanArgs {
            input,
            output: output.clone(),
        })
        .unwrap();
        let project = load_project_manifest(dir.path()).unwrap();
        assert_eq!(project.summary(), "1 phases, 1 modules, 1 tasks");
    }

    #[test]
    fn test_project_name_uses_directory_name() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("calc");
        std::fs::create_dir(&project).unwrap();
        assert_eq!(project_name(&project).unwrap(), "calc");
        assert!(project_name(&dir.path().join("missing")).is_err());
    }
}
