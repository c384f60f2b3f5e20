//! Completion-log selection and normalization.
//!
//! The agent writes one `default-<N.N>.json` file per LLM call into
//! `<log_dir>/log_completions`. The file with the numerically largest
//! suffix holds the full conversation. Its request messages plus the final
//! response become the normalized trajectory, minus the redundant message
//! at index 2.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info};

use super::types::{CompletionLog, ConvertedTrajectory, TrajectoryMessage};
use crate::error::TrajectoryError;

/// Subdirectory of an agent log directory holding completion logs.
pub const COMPLETIONS_DIR: &str = "log_completions";

/// Index of the message dropped from every normalized trajectory.
const REDUNDANT_MESSAGE_INDEX: usize = 2;

static COMPLETION_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^default-(\d+\.\d+)\.json$").expect("static regex"));

/// Picks the completion log with the numerically highest suffix.
///
/// `default-10.0.json` wins over `default-2.0.json`. Equal values are broken
/// by file name so the choice does not depend on directory listing order.
///
/// # Errors
///
/// Returns [`TrajectoryError::NoCompletionLog`] if the directory is missing
/// or holds no matching file.
pub fn select_completion_log(completions_dir: &Path) -> Result<PathBuf, TrajectoryError> {
    let entries = std::fs::read_dir(completions_dir)
        .map_err(|_| TrajectoryError::NoCompletionLog(completions_dir.to_path_buf()))?;

    let mut best: Option<(f64, String)> = None;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(caps) = COMPLETION_FILE.captures(&name) else {
            continue;
        };
        let Ok(value) = caps[1].parse::<f64>() else {
            continue;
        };

        let better = match &best {
            None => true,
            Some((best_value, best_name)) => {
                value > *best_value || (value == *best_value && name > *best_name)
            }
        };
        if better {
            best = Some((value, name));
        }
    }

    best.map(|(_, name)| completions_dir.join(name))
        .ok_or_else(|| TrajectoryError::NoCompletionLog(completions_dir.to_path_buf()))
}

/// Converts a parsed completion log into a normalized trajectory.
pub fn normalize(log: CompletionLog, path: &Path) -> Result<ConvertedTrajectory, TrajectoryError> {
    let malformed = |reason: &str| TrajectoryError::MalformedLog {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let mut messages = Vec::with_capacity(log.messages.len() + 1);
    for message in log.messages {
        let content = message
            .content
            .first_text()
            .ok_or_else(|| malformed("request message has no text content"))?
            .to_string();
        messages.push(TrajectoryMessage {
            content,
            role: message.role,
        });
    }

    let response = log
        .response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| malformed("response has no choices"))?
        .message;
    messages.push(TrajectoryMessage {
        content: response.content.unwrap_or_default(),
        role: response.role,
    });

    if messages.len() <= REDUNDANT_MESSAGE_INDEX {
        return Err(malformed("fewer than three messages"));
    }
    messages.remove(REDUNDANT_MESSAGE_INDEX);

    Ok(ConvertedTrajectory { messages })
}

/// Reads the newest completion log under `log_dir` and normalizes it.
pub async fn load_trajectory(log_dir: &Path) -> Result<ConvertedTrajectory, TrajectoryError> {
    let path = select_completion_log(&log_dir.join(COMPLETIONS_DIR))?;
    debug!(path = %path.display(), "Selected completion log");

    let content = fs::read_to_string(&path).await?;
    let log: CompletionLog =
        serde_json::from_str(&content).map_err(|e| TrajectoryError::MalformedLog {
            path: path.clone(),
            reason: e.to_string(),
        })?;
    normalize(log, &path)
}

/// Converts the agent log under `log_dir` into `<converted_dir>/<key>.json`.
///
/// Returns the path of the written record.
pub async fn convert_log(
    log_dir: &Path,
    converted_dir: &Path,
    key: &str,
) -> Result<PathBuf, TrajectoryError> {
    let trajectory = load_trajectory(log_dir).await?;

    fs::create_dir_all(converted_dir).await?;
    let target = converted_dir.join(format!("{}.json", key));
    fs::write(&target, to_json(&trajectory)?).await?;

    info!(
        key,
        messages = trajectory.messages.len(),
        path = %target.display(),
        "Trajectory converted"
    );
    Ok(target)
}

/// Four-space indented JSON.
fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}
