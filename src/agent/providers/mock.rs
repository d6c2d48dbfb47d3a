//! Deterministic offline provider.
//!
//! Produces a stable, input-derived response without network access.
//! Used when mock mode is enabled and in tests.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::agent::message::{ChatMessage, ChatRequest, ChatResponse};
use crate::agent::provider::LlmProvider;
use crate::error::AgentError;

/// Maximum characters of the transcript echoed back.
const MAX_ECHO_CHARS: usize = 2000;
/// Modulus for the displayed seed.
const SEED_MODULUS: u64 = 99_991;

/// Offline provider that echoes a truncated transcript.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockProvider;

impl MockProvider {
    /// Creates a new mock provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Renders the response for a message sequence.
    #[must_use]
    pub fn render(messages: &[ChatMessage]) -> String {
        let joined = messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");
        let truncated: String = joined.chars().take(MAX_ECHO_CHARS).collect();

        let digest = Sha256::digest(truncated.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let seed = u64::from_be_bytes(head) % SEED_MODULUS;

        format!(
            "MOCK_MODE RESPONSE\nseed={seed}\n\n\
             I can't call a real model right now because mock mode is enabled.\n\
             I received this input (truncated):\n{truncated}\n"
        )
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        Ok(ChatResponse {
            content: Self::render(&request.messages),
            finish_reason: Some("stop".to_string()),
            ..ChatResponse::default()
        })
    }
}
