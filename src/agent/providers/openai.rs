//! Live chat backend over `async-openai`.
//!
//! `base_url` in [`OrchestraConfig`] points it at compatible endpoints
//! such as proxies or self-hosted gateways.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
};
use async_trait::async_trait;

use crate::agent::config::OrchestraConfig;
use crate::agent::message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
use crate::agent::provider::LlmProvider;
use crate::error::{AgentError, ConfigError};

/// Chat completions backend.
///
/// Transport failures surface as [`AgentError::BackendUnavailable`] and are
/// never retried here.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    /// Creates a new provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ApiKeyMissing`] when no key is configured, or
    /// [`ConfigError::Invalid`] if the HTTP client cannot be built.
    pub fn new(config: &OrchestraConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::ApiKeyMissing)?;

        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(ref base_url) = config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::Invalid {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client: Client::with_config(openai_config).with_http_client(http),
        })
    }

    fn convert_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
        match msg.role {
            Role::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                    name: None,
                })
            }
            Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                name: None,
            }),
            Role::Assistant => {
                #[allow(deprecated)]
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.content.clone(),
                    )),
                    name: None,
                    tool_calls: None,
                    refusal: None,
                    audio: None,
                    function_call: None,
                })
            }
        }
    }

    /// Messages are forwarded in order; the temperature is always sent so
    /// that `0.0` keeps routing decisions deterministic.
    fn build_request(request: &ChatRequest) -> CreateChatCompletionRequest {
        CreateChatCompletionRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(Self::convert_message).collect(),
            temperature: Some(request.temperature),
            ..Default::default()
        }
    }
}

/// Maps an SDK error to a backend-unavailable failure.
fn backend_error(e: &OpenAIError) -> AgentError {
    let status = match e {
        OpenAIError::Reqwest(inner) => inner.status().map(|s| s.as_u16()),
        _ => None,
    };
    AgentError::BackendUnavailable {
        message: e.to_string(),
        status,
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<async-openai::Client>")
            .finish()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let openai_request = Self::build_request(request);

        let response = self
            .client
            .chat()
            .create(openai_request)
            .await
            .map_err(|e| backend_error(&e))?;

        let choice = response.choices.first();

        let content = choice
            .and_then(|c| c.message.content.as_ref())
            .cloned()
            .unwrap_or_default();

        let finish_reason = choice.and_then(|c| {
            c.finish_reason
                .as_ref()
                .map(|fr| format!("{fr:?}").to_lowercase())
        });

        let usage = response
            .usage
            .map_or_else(TokenUsage::default, |u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });

        Ok(ChatResponse {
            content,
            usage,
            finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message;

    #[test]
    fn test_convert_messages() {
        let converted = OpenAiProvider::convert_message(&message::system_message("test"));
        assert!(matches!(converted, ChatCompletionRequestMessage::System(_)));

        let converted = OpenAiProvider::convert_message(&message::user_message("hello"));
        assert!(matches!(converted, ChatCompletionRequestMessage::User(_)));

        let converted = OpenAiProvider::convert_message(&message::assistant_message("hi"));
        assert!(matches!(converted, ChatCompletionRequestMessage::Assistant(_)));
    }

    #[test]
    fn test_build_request_keeps_order_and_zero_temperature() {
        let request = ChatRequest {
            model: "gpt-4.1-mini".to_string(),
            messages: vec![
                message::system_message("route"),
                message::user_message("plan a trip"),
            ],
            temperature: 0.0,
        };
        let built = OpenAiProvider::build_request(&request);
        assert_eq!(built.model, "gpt-4.1-mini");
        assert_eq!(built.messages.len(), 2);
        assert!(matches!(
            built.messages[0],
            ChatCompletionRequestMessage::System(_)
        ));
        assert_eq!(built.temperature, Some(0.0));
    }

    #[test]
    fn test_new_requires_api_key() {
        let mut config = OrchestraConfig::builder()
            .build()
            .unwrap_or_else(|_| unreachable!());
        config.api_key = None;
        assert!(matches!(
            OpenAiProvider::new(&config),
            Err(ConfigError::ApiKeyMissing)
        ));

        config.api_key = Some("test".to_string());
        assert!(OpenAiProvider::new(&config).is_ok());
    }
}
