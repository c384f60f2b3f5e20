//! Trajectory record types.
//!
//! Raw completion logs are written by the coding agent, one JSON file per
//! LLM call. The normalized record keeps only the role/content message
//! sequence of the final call.

use serde::{Deserialize, Serialize};

/// One message of a normalized trajectory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrajectoryMessage {
    pub content: String,
    pub role: String,
}

/// Normalized `{messages: [...]}` record written to `converted_data/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertedTrajectory {
    pub messages: Vec<TrajectoryMessage>,
}

/// Agent completion log as written to `log_completions/default-<N.N>.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionLog {
    pub messages: Vec<LoggedMessage>,
    pub response: LoggedResponse,
}

/// Request message in a completion log.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggedMessage {
    pub role: String,
    pub content: MessageContent,
}

/// Message content is either plain text or a list of typed parts.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Plain text, or the text of the first part.
    pub fn first_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::Parts(parts) => parts.first().and_then(|p| p.text.as_deref()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentPart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggedResponse {
    pub choices: Vec<LoggedChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggedChoice {
    pub message: LoggedResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggedResponseMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}
