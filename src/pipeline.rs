//! Sequential multi-step pipelines.
//!
//! A pipeline document lists named steps. Each step's prompt may refer to
//! the output of an earlier step as `{{name}}`; every step is routed
//! through the [`Router`] and recorded in the session log.
//!
//! ```yaml
//! steps:
//!   - name: outline
//!     prompt: Plan a blog post about tide pools
//!   - name: draft
//!     prompt: "Write the post following this outline: {{outline}}"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::agent::Role;
use crate::agent::router::Router;
use crate::definition::load_yaml;
use crate::error::Result;
use crate::storage::SessionLog;

/// Session used when the caller does not name one.
pub const DEFAULT_PIPELINE_SESSION: &str = "pipeline";

/// A pipeline document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineDefinition {
    /// Steps in execution order.
    #[serde(default)]
    pub steps: Vec<PipelineStep>,
}

/// One step of a pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineStep {
    /// Name other steps use to reference this step's output.
    #[serde(default = "default_step_name")]
    pub name: String,
    /// Prompt template.
    #[serde(default)]
    pub prompt: String,
}

fn default_step_name() -> String {
    "step".to_string()
}

/// Output of a completed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    /// Step name.
    pub name: String,
    /// Text returned by the routed specialist.
    pub output: String,
}

/// Runs pipelines against a router, logging each step to a session.
#[derive(Clone, Copy)]
pub struct PipelineRunner<'a> {
    router: &'a Router,
    sessions: &'a dyn SessionLog,
}

impl<'a> PipelineRunner<'a> {
    /// Creates a runner.
    pub fn new(router: &'a Router, sessions: &'a dyn SessionLog) -> Self {
        Self { router, sessions }
    }

    /// Loads a pipeline document and runs it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Definition`](crate::error::Error::Definition) if the
    /// document cannot be loaded, and propagates backend and storage
    /// failures from [`run`](Self::run).
    pub async fn run_file(&self, path: &Path, session_id: &str) -> Result<Vec<StepResult>> {
        let definition: PipelineDefinition = load_yaml(path)?;
        self.run(&definition, session_id).await
    }

    /// Runs every step in order.
    ///
    /// Each step's rendered prompt is appended to the session as a user
    /// message tagged `[name]`, followed by the step output as an
    /// assistant message.
    ///
    /// # Errors
    ///
    /// Stops at the first backend or storage failure.
    pub async fn run(
        &self,
        definition: &PipelineDefinition,
        session_id: &str,
    ) -> Result<Vec<StepResult>> {
        let mut results: Vec<StepResult> = Vec::with_capacity(definition.steps.len());
        for (index, step) in definition.steps.iter().enumerate() {
            let prompt = render_prompt(&step.prompt, &results);
            info!(step = %step.name, index, session = session_id, "running pipeline step");

            self.sessions
                .append(session_id, Role::User, &format!("[{}] {prompt}", step.name))?;
            let output = self.router.run(&prompt).await?.text;
            self.sessions.append(session_id, Role::Assistant, &output)?;

            results.push(StepResult {
                name: step.name.clone(),
                output,
            });
        }
        Ok(results)
    }
}

impl std::fmt::Debug for PipelineRunner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("router", self.router)
            .finish_non_exhaustive()
    }
}

/// Substitutes `{{name}}` placeholders with earlier step outputs.
///
/// The template is scanned once, left to right. Substituted text is not
/// rescanned, and placeholders naming no completed step are kept as
/// written. When two steps share a name the earlier output wins.
#[must_use]
pub fn render_prompt(template: &str, completed: &[StepResult]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            break;
        };
        out.push_str(&rest[..open]);
        let name = &after[..close];
        if let Some(step) = completed.iter().find(|s| s.name == name) {
            out.push_str(&step.output);
            rest = &after[close + 2..];
        } else {
            out.push_str("{{");
            rest = after;
        }
    }
    out.push_str(rest);
    out
}
