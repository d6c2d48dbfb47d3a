//! Concrete LLM provider implementations.

mod mock;
mod openai;

pub use mock::MockProvider;
pub use openai::OpenAiProvider;
