//! Issue proposal shared by the fix and reproduce variants.

use std::path::Path;

use tera::Context;
use tracing::info;

use crate::error::SynthError;
use crate::llm::{TagParser, TextGenerator};
use crate::manifest::TaskTests;
use crate::prompts::{PromptId, PromptLibrary};
use crate::rollout::{read_test_prompt, test_module};

/// A defect to inject, paired with the report a resolving agent sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueProposal {
    /// Technical description used to mutate the code.
    pub issue: String,
    /// User-facing bug report.
    pub description: String,
}

/// Asks the LLM for an `<issue>` / `<description>` pair for one task.
#[derive(Clone)]
pub struct IssueProposer {
    generator: TextGenerator,
    prompts: PromptLibrary,
}

impl IssueProposer {
    pub fn new(generator: TextGenerator, prompts: PromptLibrary) -> Self {
        Self { generator, prompts }
    }

    /// Proposes a defect for `tests.task_number` based on the task's test
    /// module in `checkpoint`.
    ///
    /// # Errors
    ///
    /// [`SynthError::MissingArtifact`] if the test module does not exist;
    /// [`crate::error::LlmError::MissingTag`] (wrapped) if either tag is
    /// absent from the response.
    pub async fn propose(
        &self,
        project_description: &str,
        tests: &TaskTests,
        checkpoint: &Path,
    ) -> Result<IssueProposal, SynthError> {
        let test_prompt = read_test_prompt(checkpoint, tests).await?;

        let code_file = test_module(checkpoint, &tests.task_number);
        if !code_file.is_file() {
            return Err(SynthError::MissingArtifact(code_file));
        }
        let test_code = tokio::fs::read_to_string(&code_file).await?;

        let system = self.prompts.render_plain(PromptId::ProposeIssueSystem)?;
        let mut context = Context::new();
        context.insert("project_description", project_description);
        context.insert("test_code", &test_code);
        context.insert("test_prompt", &test_prompt);
        let user = self.prompts.render(PromptId::ProposeIssueUser, &context)?;

        info!(task = %tests.task_number, model = self.generator.model(), "Calling LLM to propose an issue");
        let response = self.generator.generate(&system, &user).await?;

        let mut fields = TagParser::new()
            .required("issue")
            .required("description")
            .parse(&response)?;
        Ok(IssueProposal {
            issue: fields.take("issue")?,
            description: fields.take("description")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::manifest::TaskIndex;
    use crate::testing::{sample_project, ScriptedProvider};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn task_tests() -> TaskTests {
        TaskIndex::build(&sample_project(&[("1.1.1", "Tokenize")]))
            .get("1.1.1")
            .cloned()
            .unwrap()
    }

    fn checkpoint(with_module: bool) -> TempDir {
        let dir = TempDir::new().unwrap();
        let tests = dir.path().join("tests");
        std::fs::create_dir_all(&tests).unwrap();
        std::fs::write(tests.join("1.1.1.md"), "split on whitespace").unwrap();
        if with_module {
            std::fs::write(tests.join("test_1_1_1.py"), "def test_behaviour(): pass").unwrap();
        }
        dir
    }

    fn proposer(provider: Arc<ScriptedProvider>) -> IssueProposer {
        IssueProposer::new(TextGenerator::new(provider, "m"), PromptLibrary::builtin())
    }

    #[tokio::test]
    async fn test_propose_reads_tests_and_parses_tags() {
        let dir = checkpoint(true);
        let provider = Arc::new(ScriptedProvider::new(&[
            "<issue> Skip the last token </issue>\n<description>Last word is lost</description>",
        ]));

        let proposal = proposer(provider.clone())
            .propose("A calculator", &task_tests(), dir.path())
            .await
            .unwrap();

        assert_eq!(
            proposal,
            IssueProposal {
                issue: "Skip the last token".to_string(),
                description: "Last word is lost".to_string(),
            }
        );
        let prompt = &provider.user_prompts()[0];
        assert!(prompt.contains("def test_behaviour(): pass"));
        assert!(prompt.contains("split on whitespace"));
        assert!(prompt.contains("Task 1.1.1: 1 total tests"));
    }

    #[tokio::test]
    async fn test_missing_test_module() {
        let dir = checkpoint(false);
        let provider = Arc::new(ScriptedProvider::new(&[]));

        let err = proposer(provider.clone())
            .propose("A calculator", &task_tests(), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, SynthError::MissingArtifact(_)));
        assert!(provider.user_prompts().is_empty());
    }

    #[tokio::test]
    async fn test_missing_description_tag() {
        let dir = checkpoint(true);
        let provider = Arc::new(ScriptedProvider::new(&["<issue>only half</issue>"]));

        let err = proposer(provider)
            .propose("A calculator", &task_tests(), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SynthError::Llm(LlmError::MissingTag { ref tag }) if tag == "description"
        ));
    }
}
