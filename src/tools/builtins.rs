//! Built-in tools: calculator, HTTP fetch, sandboxed files, text statistics.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::calc;
use super::registry::{ToolArgs, ToolHandler, ToolRegistry, ToolSpec};
use super::sandbox::{ReadOutcome, Sandbox};
use super::schema::to_text;
use crate::error::ToolError;

/// Longest expression `calc` accepts.
const MAX_EXPR_LEN: usize = 200;
/// Default and hard cap for `http_get` body size.
const HTTP_DEFAULT_MAX_CHARS: usize = 2000;
const HTTP_MAX_CHARS_CAP: usize = 20_000;
/// `http_get` request timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
/// Default `file_read` size.
const FILE_READ_DEFAULT_MAX_CHARS: usize = 4000;

/// Registers every built-in tool.
///
/// # Errors
///
/// Returns [`ToolError::DuplicateName`] if a built-in name is already
/// taken, or [`ToolError::Execution`] if the HTTP client cannot be built.
pub fn install_builtin_tools(registry: &mut ToolRegistry, sandbox: &Sandbox) -> Result<(), ToolError> {
    registry.register_fn(calc_spec(), calc_tool)?;
    registry.register(http_get_spec(), Arc::new(HttpGetTool::new()?))?;

    let writer = sandbox.clone();
    registry.register_fn(file_write_spec(), move |args| file_write(&writer, args))?;
    let reader = sandbox.clone();
    registry.register_fn(file_read_spec(), move |args| file_read(&reader, args))?;
    let lister = sandbox.clone();
    registry.register_fn(file_list_spec(), move |args| file_list(&lister, args))?;

    registry.register_fn(text_stats_spec(), text_stats)?;
    debug!(count = registry.len(), root = %sandbox.root().display(), "built-in tools installed");
    Ok(())
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn arg_text(args: &ToolArgs, key: &str) -> String {
    args.get(key).map(to_text).unwrap_or_default()
}

fn arg_usize(args: &ToolArgs, key: &str, default: usize) -> usize {
    match args.get(key) {
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(if n.as_i64().is_some_and(|v| v < 0) { 0 } else { default }),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

fn error_value(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

// ---------------------------------------------------------------------------
// calc
// ---------------------------------------------------------------------------

fn calc_spec() -> ToolSpec {
    ToolSpec::new(
        "calc",
        "Evaluate a simple math expression (numbers, + - * / ^, parentheses).",
        json!({
            "type": "object",
            "properties": { "expr": { "type": "string" } },
            "required": ["expr"]
        }),
    )
}

#[allow(clippy::unnecessary_wraps)]
fn calc_tool(args: &ToolArgs) -> Result<Value, ToolError> {
    let expr = arg_text(args, "expr");
    if expr.chars().count() > MAX_EXPR_LEN {
        return Ok(error_value("Expression too long"));
    }
    let allowed = |c: char| c.is_ascii_digit() || c.is_whitespace() || "+-*/^().,".contains(c);
    if !expr.chars().all(allowed) {
        return Ok(error_value("Invalid characters"));
    }
    Ok(match calc::evaluate(&expr) {
        Ok(value) => json!({ "value": value }),
        Err(e) => error_value(e.to_string()),
    })
}

// ---------------------------------------------------------------------------
// http_get
// ---------------------------------------------------------------------------

fn http_get_spec() -> ToolSpec {
    ToolSpec::new(
        "http_get",
        "Fetch a URL via HTTP GET and return the first N characters.",
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string" },
                "max_chars": { "type": "integer", "default": HTTP_DEFAULT_MAX_CHARS }
            },
            "required": ["url"]
        }),
    )
}

/// Read-only HTTP fetch with a fixed timeout and body cap.
struct HttpGetTool {
    client: reqwest::Client,
}

impl HttpGetTool {
    fn new() -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("orchestra-rs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ToolError::Execution {
                name: "http_get".to_string(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ToolHandler for HttpGetTool {
    async fn call(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let url = arg_text(args, "url");
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Ok(error_value("URL must start with http:// or https://"));
        }
        let limit = arg_usize(args, "max_chars", HTTP_DEFAULT_MAX_CHARS).min(HTTP_MAX_CHARS_CAP);
        let fail = |e: reqwest::Error| ToolError::Execution {
            name: "http_get".to_string(),
            message: e.to_string(),
        };

        let mut response = self.client.get(&url).send().await.map_err(fail)?;
        let status = response.status().as_u16();

        let mut body: Vec<u8> = Vec::with_capacity(limit);
        while body.len() < limit {
            match response.chunk().await.map_err(fail)? {
                Some(chunk) => body.extend_from_slice(&chunk),
                None => break,
            }
        }
        body.truncate(limit);
        debug!(%url, status, bytes = body.len(), "http_get complete");

        Ok(json!({
            "status": status,
            "text": String::from_utf8_lossy(&body),
        }))
    }
}

// ---------------------------------------------------------------------------
// Sandboxed file tools
// ---------------------------------------------------------------------------

fn file_write_spec() -> ToolSpec {
    ToolSpec::new(
        "file_write",
        "Write a text file under the sandbox directory.",
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "content": { "type": "string" }
            },
            "required": ["path", "content"]
        }),
    )
}

fn file_read_spec() -> ToolSpec {
    ToolSpec::new(
        "file_read",
        "Read a text file under the sandbox directory.",
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "max_chars": { "type": "integer", "default": FILE_READ_DEFAULT_MAX_CHARS }
            },
            "required": ["path"]
        }),
    )
}

fn file_list_spec() -> ToolSpec {
    ToolSpec::new(
        "file_list",
        "List files under the sandbox directory.",
        json!({
            "type": "object",
            "properties": { "prefix": { "type": "string", "default": "" } },
            "required": []
        }),
    )
}

fn file_write(sandbox: &Sandbox, args: &ToolArgs) -> Result<Value, ToolError> {
    let path = sandbox.write(&arg_text(args, "path"), &arg_text(args, "content"))?;
    Ok(json!({ "ok": true, "path": path }))
}

fn file_read(sandbox: &Sandbox, args: &ToolArgs) -> Result<Value, ToolError> {
    let rel = arg_text(args, "path");
    let max_chars = arg_usize(args, "max_chars", FILE_READ_DEFAULT_MAX_CHARS);
    Ok(match sandbox.read(&rel, max_chars)? {
        ReadOutcome::Text(text) => {
            let path = sandbox.relative(&sandbox.resolve(&rel)?);
            json!({ "path": path, "text": text })
        }
        ReadOutcome::NotFound => error_value("Not found"),
    })
}

fn file_list(sandbox: &Sandbox, args: &ToolArgs) -> Result<Value, ToolError> {
    let files = sandbox.list(&arg_text(args, "prefix"))?;
    Ok(json!({ "files": files }))
}

// ---------------------------------------------------------------------------
// text_stats
// ---------------------------------------------------------------------------

fn text_stats_spec() -> ToolSpec {
    ToolSpec::new(
        "text_stats",
        "Return basic statistics about a text (chars, words, lines).",
        json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        }),
    )
}

#[allow(clippy::unnecessary_wraps)]
fn text_stats(args: &ToolArgs) -> Result<Value, ToolError> {
    let text = arg_text(args, "text");
    let lines = if text.is_empty() {
        0
    } else {
        text.matches('\n').count() + 1
    };
    Ok(json!({
        "chars": text.chars().count(),
        "words": text.split_whitespace().count(),
        "lines": lines,
    }))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ToolRegistry) {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let sandbox =
            Sandbox::new(&dir.path().join("files")).unwrap_or_else(|e| panic!("sandbox failed: {e}"));
        let mut registry = ToolRegistry::new();
        install_builtin_tools(&mut registry, &sandbox)
            .unwrap_or_else(|e| panic!("install failed: {e}"));
        (dir, registry)
    }

    fn args(value: Value) -> ToolArgs {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_all_builtins_registered() {
        let (_dir, registry) = setup();
        let names: Vec<_> = registry.specs().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["calc", "http_get", "file_write", "file_read", "file_list", "text_stats"]
        );
    }

    #[test]
    fn test_installing_twice_is_a_duplicate() {
        let (dir, mut registry) = setup();
        let sandbox = Sandbox::new(&dir.path().join("files"))
            .unwrap_or_else(|e| panic!("sandbox failed: {e}"));
        assert!(matches!(
            install_builtin_tools(&mut registry, &sandbox),
            Err(ToolError::DuplicateName { .. })
        ));
    }

    #[tokio::test]
    async fn test_calc() {
        let (_dir, registry) = setup();
        let ok = registry.call("calc", &args(json!({"expr": "2 * (3 + 4)"}))).await;
        assert_eq!(ok.ok(), Some(json!({"value": 14.0})));

        let bad = registry.call("calc", &args(json!({"expr": "import os"}))).await;
        assert_eq!(bad.ok(), Some(json!({"error": "Invalid characters"})));

        let long = "1+".repeat(150);
        let too_long = registry.call("calc", &args(json!({ "expr": long }))).await;
        assert_eq!(too_long.ok(), Some(json!({"error": "Expression too long"})));

        let div = registry.call("calc", &args(json!({"expr": "1/0"}))).await;
        assert_eq!(div.ok(), Some(json!({"error": "division by zero"})));
    }

    #[tokio::test]
    async fn test_http_get_rejects_other_schemes() {
        let (_dir, registry) = setup();
        let result = registry
            .call("http_get", &args(json!({"url": "file:///etc/passwd"})))
            .await;
        assert_eq!(
            result.ok(),
            Some(json!({"error": "URL must start with http:// or https://"}))
        );
    }

    #[tokio::test]
    async fn test_file_tools_roundtrip() {
        let (_dir, registry) = setup();
        let written = registry
            .call("file_write", &args(json!({"path": "notes/a.txt", "content": "hello"})))
            .await;
        assert_eq!(written.ok(), Some(json!({"ok": true, "path": "notes/a.txt"})));

        let read = registry
            .call("file_read", &args(json!({"path": "notes/a.txt", "max_chars": 3})))
            .await;
        assert_eq!(read.ok(), Some(json!({"path": "notes/a.txt", "text": "hel"})));

        let missing = registry
            .call("file_read", &args(json!({"path": "nope.txt"})))
            .await;
        assert_eq!(missing.ok(), Some(json!({"error": "Not found"})));

        let listed = registry.call("file_list", &ToolArgs::new()).await;
        assert_eq!(listed.ok(), Some(json!({"files": ["notes/a.txt"]})));
    }

    #[tokio::test]
    async fn test_file_read_outside_sandbox() {
        let (_dir, registry) = setup();
        let result = registry
            .call("file_read", &args(json!({"path": "../../etc/passwd"})))
            .await;
        assert!(matches!(result, Err(ToolError::UnsafePath { .. })));
    }

    #[tokio::test]
    async fn test_text_stats() {
        let (_dir, registry) = setup();
        let stats = registry
            .call("text_stats", &args(json!({"text": "one two\nthree"})))
            .await;
        assert_eq!(stats.ok(), Some(json!({"chars": 13, "words": 3, "lines": 2})));

        let empty = registry.call("text_stats", &args(json!({"text": ""}))).await;
        assert_eq!(empty.ok(), Some(json!({"chars": 0, "words": 0, "lines": 0})));
    }
}
