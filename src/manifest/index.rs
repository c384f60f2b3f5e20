//! Flattened per-task view of a manifest.
//!
//! Every downstream stage (unit-test proposal, rollout, variant synthesis)
//! works from the same ordered index of non-inert tasks. Iteration order is
//! document order, not numeric order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::types::{Project, TestCase};

/// Origin of an indexed test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    Code,
    Visual,
}

impl std::fmt::Display for TestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestKind::Code => write!(f, "code"),
            TestKind::Visual => write!(f, "visual"),
        }
    }
}

/// A test tagged with its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedTest {
    #[serde(rename = "type")]
    pub kind: TestKind,
    pub name: String,
    pub description: String,
}

impl IndexedTest {
    fn from_case(kind: TestKind, case: &TestCase) -> Self {
        Self {
            kind,
            name: case.name.clone(),
            description: case.description.clone(),
        }
    }
}

/// Everything a stage needs to know about one task's tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTests {
    pub task_number: String,
    pub task_title: String,
    pub task_description: String,
    pub phase_number: u32,
    pub module_number: String,
    /// Code tests first, then visual tests.
    pub all_tests: Vec<IndexedTest>,
    pub total_tests: usize,
}

impl TaskTests {
    /// Compact listing used in unit-test and issue prompts:
    ///
    /// ```text
    /// Task 1.1.1: 2 total tests
    ///   - code: test_numbers
    ///   - visual: check_output
    /// ```
    pub fn test_summary(&self) -> String {
        let mut summary = format!("Task {}: {} total tests\n", self.task_number, self.total_tests);
        for test in &self.all_tests {
            summary.push_str(&format!("  - {}: {}\n", test.kind, test.name));
        }
        summary
    }
}

/// Ordered mapping from task number to its test bundle summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskIndex {
    entries: IndexMap<String, TaskTests>,
}

impl TaskIndex {
    /// Flattens `project` phase by phase, module by module, skipping inert tasks.
    pub fn build(project: &Project) -> Self {
        let mut entries = IndexMap::new();

        for phase in &project.phases {
            for module in &phase.modules {
                for task in &module.tasks {
                    if task.unit_tests.is_inert() {
                        continue;
                    }

                    let all_tests: Vec<IndexedTest> = task
                        .unit_tests
                        .code_tests
                        .iter()
                        .map(|t| IndexedTest::from_case(TestKind::Code, t))
                        .chain(
                            task.unit_tests
                                .visual_tests
                                .iter()
                                .map(|t| IndexedTest::from_case(TestKind::Visual, t)),
                        )
                        .collect();

                    entries.insert(
                        task.task_number.clone(),
                        TaskTests {
                            task_number: task.task_number.clone(),
                            task_title: task.title.clone(),
                            task_description: task.description.clone(),
                            phase_number: phase.phase_number,
                            module_number: module.module_number.clone(),
                            total_tests: all_tests.len(),
                            all_tests,
                        },
                    );
                }
            }
        }

        Self { entries }
    }

    pub fn get(&self, task_number: &str) -> Option<&TaskTests> {
        self.entries.get(task_number)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TaskTests)> {
        self.entries.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &TaskTests> {
        self.entries.values()
    }

    pub fn task_numbers(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
