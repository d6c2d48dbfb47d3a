//! The closed set of specialist behaviours.
//!
//! Planner, writer and analyst send one system instruction plus the query
//! and return the model text. The tool user additionally parses the output
//! for a tool call, runs the first call of the batch and reports its
//! result. Any parse or tool failure falls back to the raw model text.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::gateway::LlmGateway;
use super::message::{system_message, user_message};
use super::prompt::PromptSet;
use crate::error::AgentError;
use crate::tools::{ParseOutcome, ToolCall, ToolRegistry, coerce_args, parse_tool_output};

/// A specialist variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialist {
    /// Numbered plans with checkpoints.
    Planner,
    /// Polished prose deliverables. Default route.
    Writer,
    /// Precise analysis with stated assumptions.
    Analyst,
    /// Emits JSON tool calls that are executed against the registry.
    ToolUser,
}

impl Specialist {
    /// Every variant, in display order.
    pub const ALL: [Self; 4] = [Self::Planner, Self::Writer, Self::Analyst, Self::ToolUser];

    /// Wire name (`planner`, `writer`, `analyst`, `tool_user`).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Planner => "planner",
            Self::Writer => "writer",
            Self::Analyst => "analyst",
            Self::ToolUser => "tool_user",
        }
    }

    /// Looks up a variant by exact wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }
}

impl std::fmt::Display for Specialist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Text produced for a query plus free-form metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentResponse {
    /// Response text.
    pub text: String,
    /// `agent`, `cached`, and when a tool fired `tool`, `arg_warnings`,
    /// `skipped_calls`. The router adds `route_reason`.
    pub metadata: Map<String, Value>,
}

/// Runs specialist variants against a shared gateway and tool registry.
#[derive(Debug, Clone)]
pub struct Specialists {
    gateway: LlmGateway,
    tools: Arc<ToolRegistry>,
    prompts: Arc<PromptSet>,
    temperature: f32,
}

impl Specialists {
    /// Creates the specialist set.
    pub fn new(
        gateway: LlmGateway,
        tools: Arc<ToolRegistry>,
        prompts: Arc<PromptSet>,
        temperature: f32,
    ) -> Self {
        Self {
            gateway,
            tools,
            prompts,
            temperature,
        }
    }

    /// Runs `kind` on `query`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] only for backend failures. Tool problems are
    /// absorbed into a plain-text response.
    pub async fn run(&self, kind: Specialist, query: &str) -> Result<AgentResponse, AgentError> {
        match kind {
            Specialist::Planner | Specialist::Writer | Specialist::Analyst => {
                let system = self.prompts.for_specialist(kind).to_string();
                let (text, cached) = self.ask(&system, query).await?;
                Ok(tagged(kind, text, cached))
            }
            Specialist::ToolUser => self.run_tool_user(query).await,
        }
    }

    async fn ask(&self, system: &str, query: &str) -> Result<(String, bool), AgentError> {
        let messages = [system_message(system), user_message(query)];
        let outcome = self.gateway.chat(&messages, self.temperature).await?;
        Ok((outcome.text, outcome.cached))
    }

    async fn run_tool_user(&self, query: &str) -> Result<AgentResponse, AgentError> {
        let names: Vec<&str> = self.tools.specs().map(|s| s.name.as_str()).collect();
        let system = format!("{} {}", self.prompts.tool_user, names.join(", "));
        let (text, cached) = self.ask(&system, query).await?;

        let batch = match parse_tool_output(&text) {
            ParseOutcome::Batch(batch) => batch,
            ParseOutcome::NoCandidate => {
                debug!("no tool call in output, returning text");
                return Ok(tagged(Specialist::ToolUser, text, cached));
            }
            ParseOutcome::Invalid { reason, .. } => {
                debug!(%reason, "invalid tool call, returning text");
                return Ok(tagged(Specialist::ToolUser, text, cached));
            }
        };
        let Some(call) = batch.first() else {
            return Ok(tagged(Specialist::ToolUser, text, cached));
        };
        let skipped = batch.calls.len() - 1;

        match self.invoke(call).await {
            Ok((result, warnings)) => {
                let pretty =
                    serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string());
                let mut response = tagged(
                    Specialist::ToolUser,
                    format!("Tool result ({}):\n\n```json\n{pretty}\n```", call.tool),
                    cached,
                );
                response
                    .metadata
                    .insert("tool".to_string(), Value::String(call.tool.clone()));
                if !warnings.is_empty() {
                    response
                        .metadata
                        .insert("arg_warnings".to_string(), json!(warnings));
                }
                if skipped > 0 {
                    debug!(skipped, "only the first call of the batch was executed");
                    response
                        .metadata
                        .insert("skipped_calls".to_string(), json!(skipped));
                }
                Ok(response)
            }
            Err(e) => {
                warn!(tool = %call.tool, error = %e, "tool call failed, returning text");
                Ok(tagged(Specialist::ToolUser, text, cached))
            }
        }
    }

    /// Coerces arguments against the tool's schema and calls it.
    async fn invoke(&self, call: &ToolCall) -> Result<(Value, Vec<String>), crate::error::ToolError> {
        let (args, warnings) = match self.tools.spec(&call.tool) {
            Some(spec) => {
                let coerced = coerce_args(spec.schema(), &call.args);
                (coerced.args, coerced.warnings)
            }
            None => (call.args.clone(), Vec::new()),
        };
        let result = self.tools.call(&call.tool, &args).await?;
        Ok((result, warnings))
    }
}

fn tagged(kind: Specialist, text: String, cached: bool) -> AgentResponse {
    let mut metadata = Map::new();
    metadata.insert("agent".to_string(), Value::String(kind.name().to_string()));
    metadata.insert("cached".to_string(), Value::Bool(cached));
    AgentResponse { text, metadata }
}
