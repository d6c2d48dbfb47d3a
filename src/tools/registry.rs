//! Named tool specifications and their executable bindings.
//!
//! The registry is populated once at startup and is read-only afterwards.
//! [`ToolRegistry::call`] passes arguments through untouched; coercion is
//! the caller's job.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::schema::ToolSchema;
use crate::error::ToolError;

/// Tool arguments as supplied by the caller.
pub type ToolArgs = Map<String, Value>;

/// A tool definition: name, description and parameter schema.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: Value,
    #[serde(skip)]
    schema: ToolSchema,
}

impl ToolSpec {
    /// Creates a spec, deriving the typed schema from `parameters`.
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        let schema = ToolSchema::from_json(&parameters);
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            schema,
        }
    }

    /// Typed parameter schema.
    #[must_use]
    pub const fn schema(&self) -> &ToolSchema {
        &self.schema
    }
}

/// Executable side of a tool.
///
/// Handlers return a JSON value. Failures that the model should see (bad
/// input, missing file) are usually returned as `{"error": ...}` values;
/// [`ToolError`] is for calls that could not be carried out at all.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Runs the tool with raw arguments.
    async fn call(&self, args: &ToolArgs) -> Result<Value, ToolError>;
}

/// Adapter running a synchronous function as a [`ToolHandler`].
pub struct FnTool<F>(pub F);

#[async_trait]
impl<F> ToolHandler for FnTool<F>
where
    F: Fn(&ToolArgs) -> Result<Value, ToolError> + Send + Sync,
{
    async fn call(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        (self.0)(args)
    }
}

/// A registered tool.
struct ToolBinding {
    spec: ToolSpec,
    handler: Arc<dyn ToolHandler>,
}

/// Registry of tools keyed by unique name, in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    bindings: Vec<ToolBinding>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateName`] if the name is already taken.
    pub fn register(
        &mut self,
        spec: ToolSpec,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), ToolError> {
        if self.index.contains_key(&spec.name) {
            return Err(ToolError::DuplicateName { name: spec.name });
        }
        debug!(tool = %spec.name, "registering tool");
        self.index.insert(spec.name.clone(), self.bindings.len());
        self.bindings.push(ToolBinding { spec, handler });
        Ok(())
    }

    /// Registers a synchronous function as a tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateName`] if the name is already taken.
    pub fn register_fn<F>(&mut self, spec: ToolSpec, f: F) -> Result<(), ToolError>
    where
        F: Fn(&ToolArgs) -> Result<Value, ToolError> + Send + Sync + 'static,
    {
        self.register(spec, Arc::new(FnTool(f)))
    }

    /// All specs, in registration order.
    pub fn specs(&self) -> impl Iterator<Item = &ToolSpec> {
        self.bindings.iter().map(|b| &b.spec)
    }

    /// Spec for one tool.
    #[must_use]
    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.index.get(name).map(|&i| &self.bindings[i].spec)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Invokes a tool with raw arguments and returns its result verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] for unregistered names, or the
    /// handler's own error.
    pub async fn call(&self, name: &str, args: &ToolArgs) -> Result<Value, ToolError> {
        let binding = self
            .index
            .get(name)
            .map(|&i| &self.bindings[i])
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_string(),
            })?;
        debug!(tool = name, "calling tool");
        binding.handler.call(args).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.specs().map(|s| s.name.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_spec(name: &str) -> ToolSpec {
        ToolSpec::new(
            name,
            "Echo arguments",
            json!({"type": "object", "properties": {"x": {"type": "integer"}}}),
        )
    }

    fn registry() -> ToolRegistry {
        let mut reg = ToolRegistry::new();
        reg.register_fn(echo_spec("echo"), |args| Ok(Value::Object(args.clone())))
            .unwrap_or_else(|e| panic!("register failed: {e}"));
        reg
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut reg = registry();
        let result = reg.register_fn(echo_spec("echo"), |_| Ok(Value::Null));
        assert!(matches!(result, Err(ToolError::DuplicateName { ref name }) if name == "echo"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_specs_keep_registration_order() {
        let mut reg = registry();
        reg.register_fn(echo_spec("alpha"), |_| Ok(Value::Null))
            .unwrap_or_else(|e| panic!("register failed: {e}"));
        let names: Vec<_> = reg.specs().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["echo", "alpha"]);
        assert!(reg.spec("alpha").is_some());
    }

    #[tokio::test]
    async fn test_call_passes_raw_args() {
        let reg = registry();
        let args = json!({"x": "not a number"}).as_object().cloned().unwrap_or_default();
        let result = reg.call("echo", &args).await;
        assert_eq!(result.ok(), Some(json!({"x": "not a number"})));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let reg = registry();
        let result = reg.call("missing", &ToolArgs::new()).await;
        assert!(matches!(result, Err(ToolError::UnknownTool { .. })));
    }
}
