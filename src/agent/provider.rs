//! Pluggable LLM provider trait.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/[`ChatResponse`]
//! into provider-specific calls. This keeps routing and specialist logic
//! decoupled from any particular LLM vendor.

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse};
use crate::error::AgentError;

/// Trait for LLM provider backends.
///
/// Implementations handle the transport layer for a specific provider
/// while presenting a uniform interface to the gateway. Failures are
/// reported as [`AgentError::BackendUnavailable`] and are not retried
/// by the caller.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`, `"mock"`).
    fn name(&self) -> &'static str;

    /// Executes a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on transport or API failures.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError>;
}
