//! System+user prompt generation on top of an [`LlmProvider`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::litellm::{GenerationRequest, LlmProvider, Message};
use super::tagged::is_truncated;
use crate::error::LlmError;

/// Default sampling temperature for every proposal call.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Generates free text from a system prompt and a user prompt.
///
/// No retry happens at this layer; pipeline stages apply their own bounds.
#[derive(Clone)]
pub struct TextGenerator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f64,
}

impl TextGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends one system+user exchange and returns the first choice's text.
    pub async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let request = GenerationRequest::new(
            self.model.clone(),
            vec![Message::system(system), Message::user(user)],
        )
        .with_temperature(self.temperature);

        debug!(model = %self.model, user_len = user.len(), "Calling LLM");
        let response = self.provider.generate(request).await?;
        response
            .first_content()
            .map(str::to_string)
            .ok_or_else(|| LlmError::ParseError("No response choices received".to_string()))
    }

    /// Generates a response expected to contain a complete `<tag>` block.
    ///
    /// When the first response opens `<tag>` without closing it, the output
    /// window was exhausted. `continuation` renders a follow-up user prompt
    /// from the partial response; its answer is appended once. A block that
    /// is still unclosed fails with [`LlmError::Truncated`].
    pub async fn generate_with_continuation<F>(
        &self,
        system: &str,
        user: &str,
        tag: &str,
        continuation: F,
    ) -> Result<String, LlmError>
    where
        F: FnOnce(&str) -> Result<String, LlmError>,
    {
        let mut response = self.generate(system, user).await?;

        if is_truncated(&response, tag) {
            info!(tag, "Response appears to be truncated, asking model to continue");
            let follow_up = continuation(&response)?;
            let rest = self.generate(system, &follow_up).await?;
            response.push_str(&rest);

            if is_truncated(&response, tag) {
                warn!(tag, "Response still truncated after continuation");
                return Err(LlmError::Truncated {
                    tag: tag.to_string(),
                });
            }
        }

        Ok(response)
    }
}
