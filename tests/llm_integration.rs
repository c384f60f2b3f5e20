//! Integration tests for the LLM client.
//!
//! These tests make real API calls to an OpenAI-compatible endpoint.
//! Run with: OPENAI_BASE_URL=... OPENAI_API_KEY=... cargo test --test llm_integration -- --ignored

use std::sync::Arc;

use swe_playground::llm::{
    GenerationRequest, LiteLlmClient, LlmProvider, Message, TagParser, TextGenerator,
};

const TEST_MODEL: &str = "claude-sonnet-4-20250514";

fn create_test_client() -> LiteLlmClient {
    LiteLlmClient::from_env(TEST_MODEL)
        .expect("OPENAI_BASE_URL or LITELLM_API_BASE must be set for integration tests")
}

#[tokio::test]
#[ignore] // Run with: cargo test --test llm_integration -- --ignored
async fn test_simple_generation() {
    let client = create_test_client();

    let request = GenerationRequest::new(
        TEST_MODEL,
        vec![
            Message::system("You are a helpful assistant. Reply concisely."),
            Message::user("What is 2 + 2? Reply with just the number."),
        ],
    )
    .with_max_tokens(10)
    .with_temperature(0.0);

    let response = client.generate(request).await;
    assert!(response.is_ok(), "Generation failed: {:?}", response.err());

    let response = response.expect("Should have response");
    let content = response.first_content().expect("Should have content");
    assert!(content.contains('4'), "Expected '4' in response: {}", content);
}

#[tokio::test]
#[ignore]
async fn test_tagged_generation() {
    let generator = TextGenerator::new(Arc::new(create_test_client()), TEST_MODEL)
        .with_temperature(0.0);

    let response = generator
        .generate(
            "Answer inside the requested XML tags and nothing else.",
            "Put the word 'alpha' in <first></first> and the word 'beta' in <second></second>.",
        )
        .await
        .expect("Generation failed");

    let fields = TagParser::new()
        .required("first")
        .required("second")
        .parse(&response)
        .expect("Both tags should be present");
    assert_eq!(fields.get("first"), Some("alpha"));
    assert_eq!(fields.get("second"), Some("beta"));
}
