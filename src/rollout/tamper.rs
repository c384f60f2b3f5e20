//! Detects and repairs test edits made by the implementation stage.
//!
//! The unit-test checkpoint is authoritative. If the implementation
//! checkpoint's runner script or test module differs for any task in the
//! cumulative set, its whole `tests/` directory is replaced.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::checkpoint::{replace_tree, runner_script, test_module, TESTS_DIR};
use crate::error::RolloutError;

/// Task numbers whose test artifacts differ between the two checkpoints.
///
/// A file absent from both sides counts as unchanged; absent from one side
/// counts as a difference.
pub fn find_tampered(
    tests_checkpoint: &Path,
    implementation_checkpoint: &Path,
    tasks: &[String],
) -> io::Result<Vec<String>> {
    let mut tampered = Vec::new();
    for task in tasks {
        let pairs = [
            (
                runner_script(tests_checkpoint, task),
                runner_script(implementation_checkpoint, task),
            ),
            (
                test_module(tests_checkpoint, task),
                test_module(implementation_checkpoint, task),
            ),
        ];

        let mut differs = false;
        for (expected, actual) in &pairs {
            if read_optional(expected)? != read_optional(actual)? {
                differs = true;
            }
        }
        if differs {
            info!(task = %task, "Differences found in unit tests");
            tampered.push(task.clone());
        }
    }
    Ok(tampered)
}

/// Compares the two checkpoints and restores the authoritative tests if
/// anything changed. Returns the tasks that had been tampered with.
pub fn check_and_repair(
    tests_checkpoint: &Path,
    implementation_checkpoint: &Path,
    tasks: &[String],
) -> Result<Vec<String>, RolloutError> {
    let tampered = find_tampered(tests_checkpoint, implementation_checkpoint, tasks)?;
    if tampered.is_empty() {
        info!("No differences found in unit tests of all tasks");
        return Ok(tampered);
    }

    let source = tests_checkpoint.join(TESTS_DIR);
    if !source.is_dir() {
        return Err(RolloutError::MissingTestsCheckpoint(source));
    }
    let target: PathBuf = implementation_checkpoint.join(TESTS_DIR);
    warn!(
        tasks = ?tampered,
        from = %source.display(),
        to = %target.display(),
        "Implementation modified tests, restoring them"
    );
    replace_tree(&source, &target)?;
    Ok(tampered)
}

fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
