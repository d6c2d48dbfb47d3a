//! Provider registry and factory.
//!
//! Maps provider names to concrete [`LlmProvider`] implementations.

use crate::agent::config::OrchestraConfig;
use crate::agent::provider::LlmProvider;
use crate::agent::providers::{MockProvider, OpenAiProvider};
use crate::error::ConfigError;

/// Creates an [`LlmProvider`] based on the configured provider name.
///
/// # Supported Providers
///
/// - `"mock"`: deterministic offline generator (selected by mock mode)
/// - `"openai"`: `OpenAI`-compatible APIs via `async-openai`
///
/// # Errors
///
/// Returns [`ConfigError::UnsupportedProvider`] for unknown provider names
/// and [`ConfigError::ApiKeyMissing`] for a live backend without a key.
pub fn create_provider(config: &OrchestraConfig) -> Result<Box<dyn LlmProvider>, ConfigError> {
    if config.mock_mode {
        return Ok(Box::new(MockProvider::new()));
    }
    match config.provider.as_str() {
        "mock" => Ok(Box::new(MockProvider::new())),
        "openai" => Ok(Box::new(OpenAiProvider::new(config)?)),
        other => Err(ConfigError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}
