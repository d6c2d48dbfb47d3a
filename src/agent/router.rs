//! Query routing.
//!
//! [`Router::decide`] asks the model for a `{"agent", "reason"}` decision at
//! temperature 0. An unknown or missing agent becomes the writer; output
//! that is not a JSON object falls back to an ordered keyword heuristic.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::gateway::LlmGateway;
use super::message::{system_message, user_message};
use super::specialist::{AgentResponse, Specialist, Specialists};
use crate::error::AgentError;

/// Temperature for the decision call.
const DECISION_TEMPERATURE: f32 = 0.0;

/// Keyword groups checked in order; the first group with a hit wins.
const HEURISTICS: [(Specialist, &[&str], &str); 3] = [
    (
        Specialist::Planner,
        &["plan", "timeline", "steps", "roadmap"],
        "heuristic: planning keywords",
    ),
    (
        Specialist::Analyst,
        &["analyze", "compare", "pros", "cons", "estimate"],
        "heuristic: analysis keywords",
    ),
    (
        Specialist::ToolUser,
        &["http", "url", "calculate", "calc", "read file", "write file"],
        "heuristic: tool keywords",
    ),
];

/// Reason recorded when no heuristic keyword matches.
const HEURISTIC_DEFAULT_REASON: &str = "heuristic fallback";

/// Which specialist handles a query, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDecision {
    /// Selected variant.
    pub agent: Specialist,
    /// Model-supplied or heuristic reason.
    pub reason: String,
}

/// Routes queries to specialists.
#[derive(Debug, Clone)]
pub struct Router {
    gateway: LlmGateway,
    specialists: Specialists,
    system_prompt: String,
}

impl Router {
    /// Creates a router using `system_prompt` for decision calls.
    pub fn new(
        gateway: LlmGateway,
        specialists: Specialists,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            specialists,
            system_prompt: system_prompt.into(),
        }
    }

    /// Decides which specialist should handle `query`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the decision call itself fails. Unusable
    /// decision text is never an error.
    pub async fn decide(&self, query: &str) -> Result<RouteDecision, AgentError> {
        let messages = [system_message(&self.system_prompt), user_message(query)];
        let outcome = self.gateway.chat(&messages, DECISION_TEMPERATURE).await?;
        Ok(interpret_decision(&outcome.text, query))
    }

    /// Routes `query` and runs the selected specialist.
    ///
    /// The routing reason is added to the response metadata as
    /// `route_reason`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] for backend failures.
    pub async fn run(&self, query: &str) -> Result<AgentResponse, AgentError> {
        let decision = self.decide(query).await?;
        info!(agent = %decision.agent, reason = %decision.reason, "routed query");
        let mut response = self.specialists.run(decision.agent, query).await?;
        response
            .metadata
            .insert("route_reason".to_string(), Value::String(decision.reason));
        Ok(response)
    }
}

/// Interprets decision text, falling back to [`heuristic_route`].
#[must_use]
pub fn interpret_decision(text: &str, query: &str) -> RouteDecision {
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(strip_code_fence(text)) else {
        debug!("decision is not a JSON object, using keyword heuristic");
        return heuristic_route(query);
    };

    let agent = obj
        .get("agent")
        .and_then(Value::as_str)
        .and_then(Specialist::from_name)
        .unwrap_or(Specialist::Writer);
    let reason = match obj.get("reason") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    debug!(%agent, "model decision");
    RouteDecision { agent, reason }
}

/// Deterministic keyword routing.
#[must_use]
pub fn heuristic_route(query: &str) -> RouteDecision {
    let q = query.to_lowercase();
    HEURISTICS
        .iter()
        .find(|(_, keywords, _)| keywords.iter().any(|k| q.contains(k)))
        .map_or_else(
            || RouteDecision {
                agent: Specialist::Writer,
                reason: HEURISTIC_DEFAULT_REASON.to_string(),
            },
            |(agent, _, reason)| RouteDecision {
                agent: *agent,
                reason: (*reason).to_string(),
            },
        )
}

/// Removes a surrounding Markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::agent::prompt::PromptSet;
    use crate::storage::SqliteStorage;
    use crate::testing::ScriptedProvider;
    use crate::tools::ToolRegistry;
    use serde_json::json;
    use test_case::test_case;

    fn router(provider: Arc<ScriptedProvider>) -> Router {
        let cache = Arc::new(SqliteStorage::in_memory().unwrap_or_else(|e| panic!("{e}")));
        let gateway = LlmGateway::new(provider, cache, "test-model");
        let prompts = Arc::new(PromptSet::defaults());
        let specialists = Specialists::new(
            gateway.clone(),
            Arc::new(ToolRegistry::new()),
            prompts.clone(),
            0.2,
        );
        Router::new(gateway, specialists, prompts.router.clone())
    }

    #[test_case("please analyze and plan this", Specialist::Planner ; "planning checked before analysis")]
    #[test_case("Compare these two offers", Specialist::Analyst ; "analysis")]
    #[test_case("fetch this URL for me", Specialist::ToolUser ; "tool keywords")]
    #[test_case("calculate 2+2", Specialist::ToolUser ; "calculate")]
    #[test_case("write a haiku about autumn", Specialist::Writer ; "default")]
    fn test_heuristic_route(query: &str, expected: Specialist) {
        assert_eq!(heuristic_route(query).agent, expected);
    }

    #[test]
    fn test_heuristic_reasons() {
        assert_eq!(heuristic_route("roadmap").reason, "heuristic: planning keywords");
        assert_eq!(heuristic_route("hello").reason, "heuristic fallback");
    }

    #[test_case(r#"{"agent":"wizard","reason":"magic"}"# ; "unknown agent")]
    #[test_case(r#"{"agent":7,"reason":"magic"}"# ; "non-string agent")]
    #[test_case(r#"{"reason":"magic"}"# ; "missing agent")]
    fn test_unknown_agent_becomes_writer(text: &str) {
        let decision = interpret_decision(text, "plan a trip");
        assert_eq!(decision.agent, Specialist::Writer);
        assert_eq!(decision.reason, "magic");
    }

    #[test]
    fn test_valid_and_fenced_decisions() {
        let decision = interpret_decision(r#"{"agent":"analyst","reason":"numbers"}"#, "x");
        assert_eq!(decision, RouteDecision {
            agent: Specialist::Analyst,
            reason: "numbers".to_string(),
        });

        let fenced = "```json\n{\"agent\":\"tool_user\",\"reason\":\"math\"}\n```";
        assert_eq!(interpret_decision(fenced, "x").agent, Specialist::ToolUser);

        let no_reason = interpret_decision(r#"{"agent":"planner"}"#, "x");
        assert_eq!(no_reason.reason, "");
    }

    #[test]
    fn test_non_object_json_uses_heuristic() {
        let decision = interpret_decision(r#"["planner"]"#, "compare prices");
        assert_eq!(decision.agent, Specialist::Analyst);
        assert_eq!(decision.reason, "heuristic: analysis keywords");
    }

    #[tokio::test]
    async fn test_decide_uses_zero_temperature() {
        let provider = Arc::new(ScriptedProvider::new([r#"{"agent":"planner","reason":"r"}"#]));
        let decision = router(provider.clone())
            .decide("anything")
            .await
            .unwrap_or_else(|e| panic!("decide failed: {e}"));
        assert_eq!(decision.agent, Specialist::Planner);
        let request = &provider.requests()[0];
        assert!(request.temperature.abs() < f32::EPSILON);
        assert!(request.messages[0].content.contains("STRICT JSON"));
    }

    #[tokio::test]
    async fn test_run_merges_route_reason() {
        let provider = Arc::new(ScriptedProvider::new([
            r#"{"agent":"analyst","reason":"needs numbers"}"#,
            "- assumption one",
        ]));
        let response = router(provider)
            .run("how many?")
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));
        assert_eq!(response.text, "- assumption one");
        assert_eq!(response.metadata["agent"], json!("analyst"));
        assert_eq!(response.metadata["route_reason"], json!("needs numbers"));
    }

    #[tokio::test]
    async fn test_unparseable_decision_routes_by_keywords() {
        let provider = Arc::new(ScriptedProvider::new(["I think the planner.", "1. step"]));
        let response = router(provider)
            .run("give me a timeline")
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));
        assert_eq!(response.metadata["agent"], json!("planner"));
        assert_eq!(
            response.metadata["route_reason"],
            json!("heuristic: planning keywords")
        );
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let result = router(Arc::new(ScriptedProvider::failing())).run("x").await;
        assert!(matches!(result, Err(AgentError::BackendUnavailable { .. })));
    }
}
