//! Cached chat gateway.
//!
//! Every request is keyed by a SHA-256 digest of its canonical form
//! (model, ordered messages, temperature). Hits are served from the
//! [`CacheStore`] without touching the backend; misses are dispatched to
//! the [`LlmProvider`] and written back before returning.

use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::message::{ChatMessage, ChatRequest};
use super::provider::LlmProvider;
use crate::error::AgentError;
use crate::storage::CacheStore;

/// Text produced by a gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOutcome {
    /// Model output.
    pub text: String,
    /// Whether the text was served from the cache.
    pub cached: bool,
}

/// Canonical message form: fields in lexicographic order.
#[derive(Serialize)]
struct CanonicalMessage<'a> {
    content: &'a str,
    role: &'a str,
}

/// Canonical request form: fields in lexicographic order.
#[derive(Serialize)]
struct CanonicalRequest<'a> {
    messages: Vec<CanonicalMessage<'a>>,
    model: &'a str,
    temperature: f64,
}

/// Computes the content address of a request.
///
/// Identical model, message sequence and temperature always yield the
/// same 64-character hex digest.
#[must_use]
pub fn cache_key(model: &str, messages: &[ChatMessage], temperature: f32) -> String {
    let canonical = CanonicalRequest {
        messages: messages
            .iter()
            .map(|m| CanonicalMessage {
                content: &m.content,
                role: m.role.as_str(),
            })
            .collect(),
        model,
        temperature: f64::from(temperature),
    };
    // Serialising plain strings and a finite float cannot fail.
    let payload = serde_json::to_vec(&canonical).unwrap_or_default();
    hex::encode(Sha256::digest(&payload))
}

/// Abbreviated key for log lines.
fn short_key(key: &str) -> &str {
    key.get(..12).unwrap_or(key)
}

/// Chat gateway with a content-addressed response cache.
#[derive(Clone)]
pub struct LlmGateway {
    provider: Arc<dyn LlmProvider>,
    cache: Arc<dyn CacheStore>,
    model: String,
}

impl LlmGateway {
    /// Creates a gateway for `model` over the given backend and cache.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        cache: Arc<dyn CacheStore>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            cache,
            model: model.into(),
        }
    }

    /// Model identifier used for requests and cache keys.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Name of the underlying backend.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Sends `messages` at `temperature`, consulting the cache first.
    ///
    /// An unreadable cache entry is treated as a miss and overwritten. A
    /// failed cache write is logged and the fresh text is still returned.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::BackendUnavailable`] when the backend fails on
    /// a miss. The failure is not retried.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<ChatOutcome, AgentError> {
        let key = cache_key(&self.model, messages, temperature);

        match self.cache.get(&key) {
            Ok(Some(text)) => {
                debug!(key = short_key(&key), "cache hit");
                return Ok(ChatOutcome { text, cached: true });
            }
            Ok(None) => debug!(key = short_key(&key), "cache miss"),
            Err(e) => warn!(key = short_key(&key), error = %e, "unreadable cache entry, regenerating"),
        }

        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            temperature,
        };
        let response = self.provider.chat(&request).await?;

        if let Err(e) = self.cache.set(&key, &response.content) {
            warn!(key = short_key(&key), error = %e, "failed to store cache entry");
        }

        Ok(ChatOutcome {
            text: response.content,
            cached: false,
        })
    }
}

impl std::fmt::Debug for LlmGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmGateway")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
