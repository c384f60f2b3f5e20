//! Fixtures shared by unit tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::llm::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};
use crate::manifest::{save_manifest, Module, Phase, Project, Task, TestBundle, TestCase};
use crate::trajectory::COMPLETIONS_DIR;

/// Replays canned responses in order and records the user prompts it saw.
pub struct ScriptedProvider {
    replies: Mutex<Vec<String>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn user_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        if let Some(user) = request.messages.get(1) {
            self.prompts.lock().unwrap().push(user.content.clone());
        }
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| LlmError::RequestFailed("no more replies".to_string()))?;
        Ok(GenerationResponse {
            id: "id".to_string(),
            model: request.model,
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(reply),
                finish_reason: "stop".to_string(),
            }],
            usage: Usage::default(),
        })
    }
}

/// Leaves a minimal completion log in `log_dir`.
pub fn write_completion_log(log_dir: &Path) -> std::io::Result<()> {
    let completions = log_dir.join(COMPLETIONS_DIR);
    std::fs::create_dir_all(&completions)?;
    std::fs::write(
        completions.join("default-1.0.json"),
        serde_json::json!({
            "messages": [
                {"role": "system", "content": "sys"},
                {"role": "user", "content": "task"}
            ],
            "response": {"choices": [{"message": {"role": "assistant", "content": "done"}}]}
        })
        .to_string(),
    )
}

/// One phase, one module, one task per `(number, title)` pair.
pub fn sample_project(tasks: &[(&str, &str)]) -> Project {
    let tasks = tasks
        .iter()
        .map(|(number, title)| Task {
            task_number: number.to_string(),
            title: title.to_string(),
            description: format!("Implement {}", title),
            unit_tests: TestBundle {
                code_tests: vec![TestCase::new("test_behaviour", "checks behaviour")],
                visual_tests: vec![],
            },
            ..Default::default()
        })
        .collect();

    Project {
        project_name: Some("calc".to_string()),
        project_description: "A calculator".to_string(),
        constraints: Some("no eval".to_string()),
        phases: vec![Phase {
            phase_number: 1,
            title: "Core".to_string(),
            goal: "Basics".to_string(),
            modules: vec![Module {
                module_number: "1.1".to_string(),
                title: "Parser".to_string(),
                tasks,
            }],
        }],
        ..Default::default()
    }
}

/// Writes `project` as `<root>/calc/tasks.json` and returns the project dir.
pub fn write_project(root: &Path, project: &Project) -> PathBuf {
    let dir = root.join("calc");
    std::fs::create_dir_all(dir.join("tests")).unwrap();
    save_manifest(&dir.join("tasks.json"), project).unwrap();
    dir
}
