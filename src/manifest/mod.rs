//! Task manifest: data model, markdown parsing, `tasks.json` persistence
//! and the flattened task index.

pub mod index;
pub mod markdown;
pub mod types;

use std::path::Path;

use tracing::info;

pub use index::{IndexedTest, TaskIndex, TaskTests, TestKind};
pub use markdown::{clean_text, parse_file, parse_str};
pub use types::{task_file_stem, Module, Phase, Project, Task, TestBundle, TestCase};

use crate::error::ManifestError;

/// File name of the persisted manifest inside a project directory.
pub const MANIFEST_FILE: &str = "tasks.json";
/// File name of the markdown plan inside a project directory.
pub const PLAN_FILE: &str = "tasks.md";

/// Loads a `tasks.json` manifest.
///
/// # Errors
///
/// Returns [`ManifestError::NotFound`] if the file is missing, otherwise
/// IO or JSON errors.
pub fn load_manifest(path: &Path) -> Result<Project, ManifestError> {
    if !path.exists() {
        return Err(ManifestError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Loads `<project_dir>/tasks.json`.
pub fn load_project_manifest(project_dir: &Path) -> Result<Project, ManifestError> {
    load_manifest(&project_dir.join(MANIFEST_FILE))
}

/// Writes a manifest as pretty-printed JSON.
pub fn save_manifest(path: &Path, project: &Project) -> Result<(), ManifestError> {
    let json = serde_json::to_string_pretty(project)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Envelope fields stamped onto a manifest during repository setup.
#[derive(Debug, Clone, Default)]
pub struct ManifestEnvelope {
    pub project_name: Option<String>,
    pub project_id: Option<String>,
    pub constraints: Option<String>,
}

/// Parses a markdown plan and writes it as JSON.
///
/// Returns the parsed project so callers can report the summary.
pub fn convert_markdown(
    md_path: &Path,
    json_path: &Path,
    envelope: ManifestEnvelope,
) -> Result<Project, ManifestError> {
    let mut project = parse_file(md_path)?;
    project.project_name = envelope.project_name;
    project.project_id = envelope.project_id;
    project.constraints = envelope.constraints;

    save_manifest(json_path, &project)?;
    info!(
        input = %md_path.display(),
        output = %json_path.display(),
        summary = %project.summary(),
        "Converted task plan"
    );
    Ok(project)
}
