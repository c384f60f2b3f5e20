//! Per-task unit-test proposal documents (`tests/<task>.md`).

use std::path::{Path, PathBuf};

use tera::Context;
use tracing::info;

use super::projects::Proposer;
use crate::error::ProposeError;
use crate::manifest::{load_project_manifest, TaskIndex, PLAN_FILE};
use crate::prompts::PromptId;
use crate::rollout::{proposal_doc, remove_tree, TESTS_DIR};

impl Proposer {
    /// Recreates `tests/` and writes one proposal document per indexed task,
    /// in index order. Each prompt carries the test summaries of every
    /// earlier task so proposals stay consistent across the plan.
    pub async fn generate_unit_test_docs(
        &self,
        project_dir: &Path,
    ) -> Result<Vec<PathBuf>, ProposeError> {
        let tests_dir = project_dir.join(TESTS_DIR);
        remove_tree(&tests_dir)?;
        std::fs::create_dir_all(&tests_dir)?;

        let project = load_project_manifest(project_dir)?;
        let tasks_prompt = std::fs::read_to_string(project_dir.join(PLAN_FILE))?;
        let index = TaskIndex::build(&project);
        let system = self.prompts().render_plain(PromptId::UnitTestSystem)?;

        let mut previous_unit_tests = String::new();
        let mut written = Vec::with_capacity(index.len());
        for tests in index.values() {
            let unit_test_prompt = tests.test_summary();

            let mut context = Context::new();
            context.insert("project_description", &project.project_description);
            context.insert("tasks_prompt", &tasks_prompt);
            context.insert("previous_unit_tests", &previous_unit_tests);
            context.insert("unit_test_prompt", &unit_test_prompt);
            let user = self.prompts().render(PromptId::UnitTestUser, &context)?;

            info!(task = %tests.task_number, "Generating unit test documentation");
            let response = self.generator().generate(&system, &user).await?;

            let path = proposal_doc(project_dir, &tests.task_number);
            std::fs::write(&path, response)?;
            written.push(path);

            previous_unit_tests.push_str(&unit_test_prompt);
            previous_unit_tests.push_str("\n\n");
        }

        info!(documents = written.len(), "Unit test documentation generated");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::TextGenerator;
    use crate::manifest::{Module, Project, Task};
    use crate::prompts::PromptLibrary;
    use crate::testing::{sample_project, write_project, ScriptedProvider};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_documents_thread_previous_summaries() {
        let root = TempDir::new().unwrap();
        let mut project = sample_project(&[("1.1.1", "Tokenize"), ("1.1.2", "Evaluate")]);
        project.phases[0].modules.push(Module {
            module_number: "1.2".to_string(),
            title: "Docs".to_string(),
            tasks: vec![Task {
                task_number: "1.2.1".to_string(),
                title: "Write docs".to_string(),
                ..Default::default()
            }],
        });
        let project_dir = write_project(root.path(), &project);
        std::fs::write(project_dir.join(PLAN_FILE), "# Phase 1: Core").unwrap();
        std::fs::write(project_dir.join("tests/stale.md"), "old").unwrap();

        let provider = Arc::new(ScriptedProvider::new(&["doc one", "doc two"]));
        let proposer = Proposer::new(
            TextGenerator::new(provider.clone(), "m"),
            PromptLibrary::builtin(),
        );

        let written = proposer.generate_unit_test_docs(&project_dir).await.unwrap();
        assert_eq!(
            written,
            vec![
                project_dir.join("tests/1.1.1.md"),
                project_dir.join("tests/1.1.2.md")
            ]
        );
        assert_eq!(std::fs::read_to_string(&written[1]).unwrap(), "doc two");
        assert!(!project_dir.join("tests/stale.md").exists());

        let prompts = provider.user_prompts();
        assert!(prompts[0].contains("Task 1.1.1: 1 total tests"));
        assert!(!prompts[0].contains("Task 1.1.2"));
        assert!(prompts[1].contains("Task 1.1.1: 1 total tests"));
        assert!(prompts[1].contains("Task 1.1.2: 1 total tests"));
    }

    #[tokio::test]
    async fn test_missing_plan_file() {
        let root = TempDir::new().unwrap();
        let project_dir = write_project(root.path(), &Project::default());
        let proposer = Proposer::new(
            TextGenerator::new(Arc::new(ScriptedProvider::new(&[])), "m"),
            PromptLibrary::builtin(),
        );
        let err = proposer.generate_unit_test_docs(&project_dir).await.unwrap_err();
        assert!(matches!(err, ProposeError::Io(_)));
    }
}
