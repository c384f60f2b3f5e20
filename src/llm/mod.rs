//! LLM integration.
//!
//! The generation backend is an opaque `prompt -> text` function. This
//! module provides the provider trait with an OpenAI-compatible client,
//! a [`TextGenerator`] for system+user exchanges (including the one-shot
//! continuation protocol for truncated tagged blocks), and a small parser
//! for `<tag>...</tag>` fields.
//!
//! ```ignore
//! use std::sync::Arc;
//! use swe_playground::llm::{LiteLlmClient, TagParser, TextGenerator};
//!
//! let client = LiteLlmClient::from_env("claude-sonnet-4-20250514")?;
//! let generator = TextGenerator::new(Arc::new(client), "claude-sonnet-4-20250514");
//! let response = generator.generate(&system, &user).await?;
//! let fields = TagParser::new().required("issue").required("description").parse(&response)?;
//! ```

pub mod generator;
pub mod litellm;
pub mod tagged;

pub use generator::{TextGenerator, DEFAULT_TEMPERATURE};
pub use litellm::{
    Choice, GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider, Message, Role,
    Usage,
};
pub use tagged::{extract_tag, is_truncated, TagParser, TaggedResponse};
