//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use swe_playground::agent::{AgentRequest, AgentTranscript, CodingAgent};
use swe_playground::error::{AgentError, LlmError};
use swe_playground::llm::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};
use swe_playground::manifest::{
    save_manifest, task_file_stem, Module, Phase, Project, Task, TestBundle, TestCase,
};
use swe_playground::trajectory::COMPLETIONS_DIR;

pub const PROJECT: &str = "calc";

/// A project with one module holding the given task numbers, each with a
/// single code test and a proposal document under `tests/`.
pub fn write_project(root: &Path, tasks: &[&str]) -> PathBuf {
    let dir = root.join(PROJECT);
    std::fs::create_dir_all(dir.join("tests")).unwrap();
    for task in tasks {
        std::fs::write(dir.join(format!("tests/{task}.md")), format!("tests for {task}")).unwrap();
    }

    let project = Project {
        project_name: Some(PROJECT.to_string()),
        project_description: "A calculator".to_string(),
        constraints: Some("no eval".to_string()),
        phases: vec![Phase {
            phase_number: 1,
            title: "Core".to_string(),
            goal: "Basics".to_string(),
            modules: vec![Module {
                module_number: "1.1".to_string(),
                title: "Parser".to_string(),
                tasks: tasks
                    .iter()
                    .map(|task| Task {
                        task_number: task.to_string(),
                        title: format!("Task {task}"),
                        description: format!("Implement {task}"),
                        unit_tests: TestBundle {
                            code_tests: vec![TestCase::new("test_behaviour", "checks behaviour")],
                            visual_tests: vec![],
                        },
                        ..Default::default()
                    })
                    .collect(),
            }],
        }],
        ..Default::default()
    };
    save_manifest(&dir.join("tasks.json"), &project).unwrap();
    dir
}

/// One recorded agent invocation: `(task, stage)`.
pub type Call = (String, String);

/// Plays both rollout stages by writing files.
///
/// The unit-test stage writes `tests/<task>.sh`, which checks for
/// `impl_<stem>.txt`, plus the task's test module. The implementation stage
/// writes that file unless the task is listed in `skip_impl`. When
/// `tamper` is set the implementation stage also neuters every runner
/// script already in the checkpoint.
#[derive(Default)]
pub struct FileAgent {
    pub calls: Mutex<Vec<Call>>,
    pub skip_impl: HashSet<String>,
    pub fail_impl: HashSet<String>,
    pub tamper: bool,
}

impl FileAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skipping(mut self, task: &str) -> Self {
        self.skip_impl.insert(task.to_string());
        self
    }

    pub fn failing(mut self, task: &str) -> Self {
        self.fail_impl.insert(task.to_string());
        self
    }

    pub fn tampering(mut self) -> Self {
        self.tamper = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, task: &str) -> usize {
        self.calls().iter().filter(|(t, _)| t == task).count()
    }
}

/// Splits `calc_<task>_<stage>` into task and stage.
fn parse_checkpoint(dir: &Path) -> (String, String) {
    let name = dir.file_name().unwrap().to_string_lossy().into_owned();
    let rest = name.strip_prefix(&format!("{PROJECT}_")).unwrap();
    let (task, stage) = rest.split_once('_').unwrap();
    (task.to_string(), stage.to_string())
}

#[async_trait]
impl CodingAgent for FileAgent {
    async fn run(&self, request: &AgentRequest) -> Result<AgentTranscript, AgentError> {
        let (task, stage) = parse_checkpoint(&request.working_dir);
        self.calls.lock().unwrap().push((task.clone(), stage.clone()));

        let dir = &request.working_dir;
        let stem = task_file_stem(&task);
        if stage == "unit_test" {
            std::fs::write(
                dir.join(format!("tests/{task}.sh")),
                format!("test -f impl_{stem}.txt\n"),
            )?;
            std::fs::write(
                dir.join(format!("tests/test_{stem}.py")),
                "def test_behaviour():\n    pass\n",
            )?;
        } else {
            if self.fail_impl.contains(&task) {
                return Err(AgentError::Failed {
                    code: 1,
                    stderr: "crashed".to_string(),
                });
            }
            if !self.skip_impl.contains(&task) {
                std::fs::write(dir.join(format!("impl_{stem}.txt")), "done")?;
            }
            if self.tamper {
                for entry in std::fs::read_dir(dir.join("tests"))? {
                    let path = entry?.path();
                    if path.extension().is_some_and(|e| e == "sh") {
                        std::fs::write(&path, "exit 0\n")?;
                    }
                }
            }
        }

        if let Some(log_dir) = &request.output_dir {
            write_completion_log(log_dir, &task)?;
        }
        Ok(AgentTranscript::default())
    }
}

pub fn write_completion_log(log_dir: &Path, task: &str) -> std::io::Result<()> {
    let completions = log_dir.join(COMPLETIONS_DIR);
    std::fs::create_dir_all(&completions)?;
    std::fs::write(
        completions.join("default-1.0.json"),
        serde_json::json!({
            "messages": [
                {"role": "system", "content": "sys"},
                {"role": "user", "content": format!("work on {task}")}
            ],
            "response": {"choices": [{"message": {"role": "assistant", "content": "done"}}]}
        })
        .to_string(),
    )
}

/// Replays one canned reply for every request and counts the calls.
pub struct RepeatingProvider {
    reply: String,
    pub calls: Mutex<usize>,
}

impl RepeatingProvider {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl LlmProvider for RepeatingProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        *self.calls.lock().unwrap() += 1;
        Ok(GenerationResponse {
            id: "id".to_string(),
            model: request.model,
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(self.reply.clone()),
                finish_reason: "stop".to_string(),
            }],
            usage: Usage::default(),
        })
    }
}
