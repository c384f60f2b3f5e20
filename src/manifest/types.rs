//! Task manifest data model.
//!
//! The tree mirrors the `tasks.json` document written next to every
//! generated project: a project holds phases, phases hold modules, modules
//! hold tasks, and every task carries its proposed unit tests.

use serde::{Deserialize, Serialize};

/// Root of the task manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Repository name, set when the manifest is written during setup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    /// Unix-seconds identifier assigned during setup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default)]
    pub project_description: String,
    #[serde(default)]
    pub task_instruction: String,
    /// Allowed implementation techniques, threaded into downstream prompts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<String>,
    #[serde(default)]
    pub phases: Vec<Phase>,
}

impl Project {
    /// Iterates every task in document order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.phases
            .iter()
            .flat_map(|p| p.modules.iter())
            .flat_map(|m| m.tasks.iter())
    }

    pub fn module_count(&self) -> usize {
        self.phases.iter().map(|p| p.modules.len()).sum()
    }

    pub fn task_count(&self) -> usize {
        self.tasks().count()
    }

    /// Human readable "N phases, M modules, T tasks" line.
    pub fn summary(&self) -> String {
        format!(
            "{} phases, {} modules, {} tasks",
            self.phases.len(),
            self.module_count(),
            self.task_count()
        )
    }

    /// Name used for checkpoint directories; falls back to "project".
    pub fn name(&self) -> &str {
        self.project_name.as_deref().unwrap_or("project")
    }

    pub fn constraints(&self) -> &str {
        self.constraints.as_deref().unwrap_or_default()
    }
}

/// A numbered phase of the project plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub phase_number: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub modules: Vec<Module>,
}

/// A module within a phase, numbered "P.M".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub module_number: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Smallest unit of implementation work, numbered "P.M.T".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_number: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Difficulty on a 1-5 scale, absent when the manifest omits it.
    #[serde(default)]
    pub difficulty: Option<u8>,
    #[serde(default)]
    pub unit_tests: TestBundle,
}

impl Task {
    /// Task number with dots replaced, as used in test file names.
    pub fn file_stem(&self) -> String {
        task_file_stem(&self.task_number)
    }
}

/// Converts "1.2.3" into "1_2_3".
pub fn task_file_stem(task_number: &str) -> String {
    task_number.replace('.', "_")
}

/// Proposed tests for one task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestBundle {
    #[serde(default)]
    pub code_tests: Vec<TestCase>,
    #[serde(default)]
    pub visual_tests: Vec<TestCase>,
}

impl TestBundle {
    /// A bundle without any test is inert and never rolled out.
    pub fn is_inert(&self) -> bool {
        self.code_tests.is_empty() && self.visual_tests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.code_tests.len() + self.visual_tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_inert()
    }
}

/// A named test with its natural-language description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl TestCase {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}
