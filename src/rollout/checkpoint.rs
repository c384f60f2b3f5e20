//! Runtime directory layout and checkpoint snapshots.
//!
//! A runtime directory holds one copy of the project per (task, stage):
//!
//! ```text
//! runtime_<unix>/
//!   <project>_<task>_unit_test/       tests written, nothing implemented
//!   <project>_<task>_implementation/  accepted base for the next task
//!   <project>_<task>_issue/           fix variant with injected defect
//!   <project>_<task>_fix/<project>/   fix variant resolution workspace
//!   log_<task>_<stage>/               agent logs
//!   converted_data/<key>.json         normalized trajectories
//! ```
//!
//! A checkpoint directory that exists is a completed stage. Resuming a run
//! relies on nothing else.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::TestRunError;
use crate::manifest::{task_file_stem, TaskTests};

/// Subdirectory of the runtime directory holding converted trajectories.
pub const CONVERTED_DIR: &str = "converted_data";

/// Test directory inside every project checkpoint.
pub const TESTS_DIR: &str = "tests";

/// A pipeline stage that owns a checkpoint directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    UnitTest,
    Implementation,
    Issue,
    IssueSwt,
    Fix,
    Reproduce,
}

impl Stage {
    pub fn suffix(&self) -> &'static str {
        match self {
            Stage::UnitTest => "unit_test",
            Stage::Implementation => "implementation",
            Stage::Issue => "issue",
            Stage::IssueSwt => "issue_swt",
            Stage::Fix => "fix",
            Stage::Reproduce => "reproduce",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Paths inside one runtime directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeLayout {
    root: PathBuf,
    project_name: String,
}

impl RuntimeLayout {
    /// Layout over an existing (or resumed) runtime directory.
    pub fn new(root: impl Into<PathBuf>, project_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            project_name: project_name.into(),
        }
    }

    /// Creates `<runtime_folder>/runtime_<unix_seconds>/converted_data`.
    pub fn create(runtime_folder: &Path, project_name: &str) -> io::Result<Self> {
        let stamp = chrono::Utc::now().timestamp();
        let layout = Self::new(runtime_folder.join(format!("runtime_{}", stamp)), project_name);
        layout.ensure()?;
        Ok(layout)
    }

    /// Makes sure the root and `converted_data/` exist.
    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.converted_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// `<root>/<project>_<task>_<stage>`
    pub fn checkpoint(&self, task_number: &str, stage: Stage) -> PathBuf {
        self.root
            .join(format!("{}_{}_{}", self.project_name, task_number, stage))
    }

    /// The project copy nested inside a stage directory. The agent runs in
    /// the outer directory so the repository keeps its own name.
    pub fn nested_checkpoint(&self, task_number: &str, stage: Stage) -> PathBuf {
        self.checkpoint(task_number, stage).join(&self.project_name)
    }

    /// `<root>/log_<task>_<stage>`
    pub fn log_dir(&self, task_number: &str, stage: Stage) -> PathBuf {
        self.root.join(format!("log_{}_{}", task_number, stage))
    }

    pub fn converted_dir(&self) -> PathBuf {
        self.root.join(CONVERTED_DIR)
    }

    /// Key of a task's converted trajectory for `stage`.
    pub fn record_key(task_number: &str, stage: Stage) -> String {
        format!("{}_{}", task_number, stage)
    }

    pub fn record_path(&self, key: &str) -> PathBuf {
        self.converted_dir().join(format!("{}.json", key))
    }

    pub fn has_record(&self, task_number: &str, stage: Stage) -> bool {
        self.record_path(&Self::record_key(task_number, stage))
            .is_file()
    }

    /// True when both rollout stages of the task were accepted and converted.
    pub fn has_rollout_records(&self, task_number: &str) -> bool {
        self.has_record(task_number, Stage::UnitTest)
            && self.has_record(task_number, Stage::Implementation)
    }
}

/// `tests/<task>.sh`
pub fn runner_script(project_dir: &Path, task_number: &str) -> PathBuf {
    project_dir.join(TESTS_DIR).join(format!("{}.sh", task_number))
}

/// `tests/<task>.md`
pub fn proposal_doc(project_dir: &Path, task_number: &str) -> PathBuf {
    project_dir.join(TESTS_DIR).join(format!("{}.md", task_number))
}

/// `tests/test_<task_with_underscores>.py`
pub fn test_module(project_dir: &Path, task_number: &str) -> PathBuf {
    project_dir
        .join(TESTS_DIR)
        .join(format!("test_{}.py", task_file_stem(task_number)))
}

/// Builds the test overview handed to the agent and the issue proposer:
/// the task's test list followed by its detailed proposal document.
pub async fn read_test_prompt(
    project_dir: &Path,
    tests: &TaskTests,
) -> Result<String, TestRunError> {
    let path = proposal_doc(project_dir, &tests.task_number);
    let proposal = tokio::fs::read_to_string(&path).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => TestRunError::MissingArtifact {
            task: tests.task_number.clone(),
            path: path.clone(),
        },
        _ => TestRunError::Io(e),
    })?;

    let mut prompt = tests.test_summary();
    prompt.push_str("The detailed unit tests proposal:\n\n");
    prompt.push_str(&proposal);
    Ok(prompt)
}

/// Recursively copies `src` into `dst`, creating `dst` as needed.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dst.join(rel);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    debug!(src = %src.display(), dst = %dst.display(), "Copied tree");
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    let points_to = std::fs::read_link(link)?;
    std::os::unix::fs::symlink(points_to, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    std::fs::copy(link, target).map(|_| ())
}

/// Removes `path` recursively; a missing path is not an error.
pub fn remove_tree(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Replaces `dst` with a fresh copy of `src`.
pub fn replace_tree(src: &Path, dst: &Path) -> io::Result<()> {
    remove_tree(dst)?;
    copy_tree(src, dst)
}
