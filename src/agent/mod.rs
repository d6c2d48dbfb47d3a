//! Query routing and specialist agents.
//!
//! # Architecture
//!
//! ```text
//! query → Router::decide (LlmGateway, temperature 0)
//!   ├── JSON decision → known variant, else Writer
//!   └── unparseable  → keyword heuristic
//! → Specialists::run(variant)
//!   ├── Planner / Writer / Analyst → LlmGateway → text
//!   └── ToolUser → LlmGateway → parse_tool_output → coerce_args → ToolRegistry::call
//! → AgentResponse { text, metadata + route_reason }
//! ```
//!
//! Every model call goes through [`LlmGateway`], which serves repeated
//! requests from the response cache.

pub mod client;
pub mod config;
pub mod gateway;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod router;
pub mod specialist;

// Re-export key types
pub use client::create_provider;
pub use config::OrchestraConfig;
pub use gateway::{ChatOutcome, LlmGateway, cache_key};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use router::{RouteDecision, Router, heuristic_route, interpret_decision};
pub use specialist::{AgentResponse, Specialist, Specialists};
