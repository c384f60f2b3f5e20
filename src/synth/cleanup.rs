//! Project-wide rewrites that hide task boundaries and implementations.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::manifest::TaskIndex;
use crate::rollout::{proposal_doc, runner_script, test_module, TESTS_DIR};

static TITLE_SPECIAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("static regex"));
static TITLE_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-\s]+").expect("static regex"));
static PLACEHOLDER_RAISE: LazyLock<Regex> = LazyLock::new(|| {
    // The argument runs to the last `)` on the line so nested calls stay whole.
    Regex::new(r"raise[ \t]+NotImplementedError\b(?:[ \t]*\(.*\))?").expect("static regex")
});

/// Directory whose Python sources lose their placeholder raises.
pub const SOURCE_DIR: &str = "src";

/// File name for a task's test module once its task number is hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameStyle {
    /// `<clean_title>.py`
    Plain,
    /// `test_<clean_title>.py`
    Prefixed,
}

/// Lowercase snake-case version of a task title.
///
/// ```
/// use swe_playground::synth::clean_title;
/// assert_eq!(clean_title("Parse CSV (fast) - v2!"), "parse_csv_fast_v2");
/// ```
pub fn clean_title(title: &str) -> String {
    let stripped = TITLE_SPECIAL.replace_all(title, "");
    TITLE_SEPARATORS
        .replace_all(stripped.trim(), "_")
        .to_lowercase()
}

/// Removes every indexed task's runner script and proposal document and
/// renames its test module after the task title. Returns the number of
/// renamed modules.
///
/// A rename that would collide with an existing file falls back to
/// `<clean_title>_<n>.py`.
pub fn cleanup_test_files(
    project_dir: &Path,
    index: &TaskIndex,
    style: RenameStyle,
) -> io::Result<usize> {
    let tests_dir = project_dir.join(TESTS_DIR);
    if !tests_dir.is_dir() {
        info!(path = %tests_dir.display(), "Tests directory does not exist, skipping cleanup");
        return Ok(0);
    }

    let mut renamed = 0;
    for tests in index.values() {
        let task = tests.task_number.as_str();
        remove_file_if_exists(&runner_script(project_dir, task))?;
        remove_file_if_exists(&proposal_doc(project_dir, task))?;

        let module = test_module(project_dir, task);
        if !module.is_file() || tests.task_title.is_empty() {
            continue;
        }

        let title = clean_title(&tests.task_title);
        let target = rename_target(&tests_dir, &module, &title, style);
        if target != module {
            std::fs::rename(&module, &target)?;
            debug!(from = %module.display(), to = %target.display(), "Renamed test module");
            renamed += 1;
        }
    }

    info!(renamed, "Completed test file cleanup for all tasks");
    Ok(renamed)
}

fn rename_target(tests_dir: &Path, current: &Path, title: &str, style: RenameStyle) -> PathBuf {
    let preferred = match style {
        RenameStyle::Plain => tests_dir.join(format!("{}.py", title)),
        RenameStyle::Prefixed => tests_dir.join(format!("test_{}.py", title)),
    };

    let mut candidate = preferred;
    let mut counter = 1;
    while candidate.exists() && candidate != current {
        candidate = tests_dir.join(format!("{}_{}.py", title, counter));
        counter += 1;
    }
    candidate
}

/// Replaces `raise NotImplementedError[(...)]` with `pass` in every Python
/// file under `src/`. Returns the number of modified files.
pub fn strip_placeholders(project_dir: &Path) -> io::Result<usize> {
    let src_dir = project_dir.join(SOURCE_DIR);
    if !src_dir.is_dir() {
        info!(path = %src_dir.display(), "Source directory does not exist, skipping placeholder stripping");
        return Ok(0);
    }

    let mut modified = 0;
    for entry in WalkDir::new(&src_dir) {
        let entry = entry.map_err(io::Error::other)?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("py") {
            continue;
        }

        let content = std::fs::read_to_string(path)?;
        if !PLACEHOLDER_RAISE.is_match(&content) {
            continue;
        }
        let rewritten = PLACEHOLDER_RAISE.replace_all(&content, "pass");
        std::fs::write(path, rewritten.as_bytes())?;
        debug!(path = %path.display(), "Stripped placeholders");
        modified += 1;
    }

    info!(files = modified, "Completed NotImplementedError replacement");
    Ok(modified)
}

fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
