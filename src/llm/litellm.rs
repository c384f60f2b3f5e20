//! OpenAI-compatible chat completion client.
//!
//! Proposal stages talk to a LiteLLM proxy (or any endpoint speaking the
//! `/chat/completions` protocol) with a single system + user exchange. The
//! [`LlmProvider`] trait is the seam the rest of the crate depends on, so
//! tests substitute scripted providers.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LlmError;

/// Generations for a full task plan can take minutes.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of a chat completion request. An empty `model` means the client's
/// default model.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Clone)]
pub struct GenerationResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
}

impl GenerationResponse {
    /// Text of the first choice.
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Choice {
    pub index: u32,
    pub message: Message,
    /// "stop", "length", ... Empty when the endpoint omits it.
    pub finish_reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A text generation backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError>;
}

/// Client for a LiteLLM proxy or any other OpenAI-compatible endpoint.
pub struct LiteLlmClient {
    api_base: String,
    api_key: Option<String>,
    default_model: String,
    http_client: Client,
}

impl LiteLlmClient {
    pub fn new(api_base: String, api_key: Option<String>, default_model: String) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            default_model,
            http_client: build_http_client(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    /// Reads `OPENAI_BASE_URL` (falling back to `LITELLM_API_BASE`) and
    /// `OPENAI_API_KEY` (falling back to `LITELLM_API_KEY`).
    ///
    /// # Errors
    ///
    /// [`LlmError::MissingApiBase`] if no base URL is set.
    pub fn from_env(default_model: impl Into<String>) -> Result<Self, LlmError> {
        let api_base =
            first_env(&["OPENAI_BASE_URL", "LITELLM_API_BASE"]).ok_or(LlmError::MissingApiBase)?;
        let api_key = first_env(&["OPENAI_API_KEY", "LITELLM_API_KEY"]);
        Ok(Self::new(api_base, api_key, default_model.into()))
    }

    /// Overrides the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http_client = build_http_client(timeout);
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| env::var(name).ok().filter(|v| !v.is_empty()))
}

fn build_http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    #[serde(default)]
    index: u32,
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default = "assistant_role")]
    role: Role,
    /// Null for refusals and tool-only replies.
    #[serde(default)]
    content: Option<String>,
}

fn assistant_role() -> Role {
    Role::Assistant
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: String,
}

impl WireResponse {
    fn into_response(self, requested_model: &str) -> Result<GenerationResponse, LlmError> {
        if self.choices.is_empty() {
            return Err(LlmError::ParseError("No response choices received".to_string()));
        }

        let choices = self
            .choices
            .into_iter()
            .map(|choice| Choice {
                index: choice.index,
                message: Message {
                    role: choice.message.role,
                    content: choice.message.content.unwrap_or_default(),
                },
                finish_reason: choice.finish_reason.unwrap_or_default(),
            })
            .collect();

        Ok(GenerationResponse {
            id: self.id,
            model: if self.model.is_empty() {
                requested_model.to_string()
            } else {
                self.model
            },
            choices,
            usage: self.usage.unwrap_or_default(),
        })
    }
}

/// Maps a non-success status and its body to an error, preferring the
/// endpoint's own `{"error": {"message": ...}}` text.
fn api_error(status: u16, body: &str) -> LlmError {
    let message = serde_json::from_str::<WireError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());
    if status == 429 {
        LlmError::RateLimited(message)
    } else {
        LlmError::ApiError {
            code: status,
            message,
        }
    }
}

#[async_trait]
impl LlmProvider for LiteLlmClient {
    async fn generate(
        &self,
        mut request: GenerationRequest,
    ) -> Result<GenerationResponse, LlmError> {
        if request.model.is_empty() {
            request.model = self.default_model.clone();
        }
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let mut http_request = self
            .http_client
            .post(format!("{}/chat/completions", self.api_base))
            .header("X-Title", "swe-playground");
        if let Some(api_key) = &self.api_key {
            http_request = http_request.bearer_auth(api_key);
        }

        let http_response = http_request
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = http_response.status();
        if !status.is_success() {
            let body = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(api_error(status.as_u16(), &body));
        }

        let wire: WireResponse = http_response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {}", e)))?;
        wire.into_response(&request.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body() {
        let request = GenerationRequest::new("m", vec![Message::system("s"), Message::user("u")]);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["role"], "user");
        assert!(value.get("temperature").is_none());
        assert!(value.get("max_tokens").is_none());

        let value = serde_json::to_value(request.with_temperature(0.7)).unwrap();
        assert_eq!(value["temperature"], 0.7);
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = LiteLlmClient::new(
            "http://localhost:4000/".to_string(),
            None,
            "gpt-4o".to_string(),
        );
        assert_eq!(client.api_base(), "http://localhost:4000");
        assert_eq!(client.default_model(), "gpt-4o");
        assert!(!client.has_api_key());
    }

    #[test]
    fn test_wire_response_tolerates_missing_fields() {
        let body = r#"{"choices":[{"message":{"content":null}}]}"#;
        let wire: WireResponse = serde_json::from_str(body).unwrap();
        let response = wire.into_response("fallback").unwrap();

        assert_eq!(response.model, "fallback");
        assert_eq!(response.first_content(), Some(""));
        assert_eq!(response.choices[0].message.role, Role::Assistant);
        assert_eq!(response.usage, Usage::default());
    }

    #[test]
    fn test_wire_response_without_choices() {
        let wire: WireResponse = serde_json::from_str(r#"{"id":"x","choices":[]}"#).unwrap();
        assert!(matches!(
            wire.into_response("m"),
            Err(LlmError::ParseError(_))
        ));
    }

    #[test]
    fn test_api_error_mapping() {
        let body = r#"{"error":{"message":"slow down"}}"#;
        assert!(matches!(api_error(429, body), LlmError::RateLimited(m) if m == "slow down"));
        assert!(matches!(
            api_error(500, "upstream crashed"),
            LlmError::ApiError { code: 500, message } if message == "upstream crashed"
        ));
    }
}
