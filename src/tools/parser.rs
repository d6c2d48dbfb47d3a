//! Extraction of structured tool calls from free-form model output.
//!
//! Parsing happens in two separate steps:
//!
//! 1. [`extract_candidate`] finds a JSON-looking span in the text (a fenced
//!    `json` block, else the first balanced `{...}` span, else the first
//!    balanced `[...]` span). Brackets inside JSON strings are ignored when
//!    balancing.
//! 2. [`parse_tool_output`] decodes that span and validates its shape.
//!
//! The outcome is three-way: no candidate, an invalid candidate, or a
//! batch of calls.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Fenced ```` ```json ```` block holding an object or array.
static JSON_BLOCK_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)```json\s*(\{.*?\}|\[.*?\])\s*```").ok());

/// A single tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Tool name (trimmed, non-empty).
    pub tool: String,
    /// Raw arguments.
    pub args: Map<String, Value>,
}

/// Ordered sequence of tool calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolBatch {
    /// Calls in reporting order.
    pub calls: Vec<ToolCall>,
}

impl ToolBatch {
    /// First call, if any.
    #[must_use]
    pub fn first(&self) -> Option<&ToolCall> {
        self.calls.first()
    }
}

/// Result of parsing model output.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// No JSON-looking text at all; treat the output as plain text.
    NoCandidate,
    /// JSON-looking text that is malformed or has the wrong shape.
    Invalid {
        /// What was wrong.
        reason: String,
        /// The offending text.
        raw: String,
    },
    /// One or more well-formed calls.
    Batch(ToolBatch),
}

/// Finds the JSON candidate in `text`, trimmed.
#[must_use]
pub fn extract_candidate(text: &str) -> Option<&str> {
    if let Some(caps) = JSON_BLOCK_RE.as_ref().and_then(|re| re.captures(text))
        && let Some(m) = caps.get(1)
    {
        return Some(m.as_str().trim());
    }
    balanced_span(text, b'{', b'}')
        .or_else(|| balanced_span(text, b'[', b']'))
        .map(str::trim)
}

/// First span starting at `open` whose brackets balance.
///
/// An opener that never closes is skipped and the next one is tried.
fn balanced_span(text: &str, open: u8, close: u8) -> Option<&str> {
    let bytes = text.as_bytes();
    bytes
        .iter()
        .enumerate()
        .filter(|&(_, &b)| b == open)
        .find_map(|(start, _)| {
            closing_offset(&bytes[start..], open, close).map(|end| &text[start..=start + end])
        })
}

/// Offset of the bracket that closes `bytes[0]`, skipping string literals.
fn closing_offset(bytes: &[u8], open: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        if b == b'"' {
            in_string = true;
        } else if b == open {
            depth += 1;
        } else if b == close {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Parses model output into a [`ParseOutcome`].
#[must_use]
pub fn parse_tool_output(text: &str) -> ParseOutcome {
    let Some(candidate) = extract_candidate(text) else {
        return ParseOutcome::NoCandidate;
    };
    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => validate_shape(&value),
        Err(e) => ParseOutcome::Invalid {
            reason: format!("invalid JSON: {e}"),
            raw: candidate.to_string(),
        },
    }
}

/// Validates a decoded value as a single call or a batch of calls.
fn validate_shape(value: &Value) -> ParseOutcome {
    let invalid = |reason: String, raw: &Value| ParseOutcome::Invalid {
        reason,
        raw: raw.to_string(),
    };

    match value {
        Value::Object(obj) => match read_call(obj) {
            Ok(call) => ParseOutcome::Batch(ToolBatch { calls: vec![call] }),
            Err(CallShape::Tool) => invalid("tool must be a non-empty string".to_string(), value),
            Err(CallShape::Args) => invalid("args must be an object".to_string(), value),
        },
        Value::Array(items) => {
            let mut calls = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let Some(obj) = item.as_object() else {
                    return invalid(format!("batch item {i} must be an object"), value);
                };
                match read_call(obj) {
                    Ok(call) => calls.push(call),
                    Err(CallShape::Tool) => {
                        return invalid(format!("batch item {i}: tool must be string"), value);
                    }
                    Err(CallShape::Args) => {
                        return invalid(format!("batch item {i}: args must be object"), value);
                    }
                }
            }
            ParseOutcome::Batch(ToolBatch { calls })
        }
        other => invalid("JSON must be an object or array".to_string(), other),
    }
}

/// Which field of a call object is malformed.
enum CallShape {
    Tool,
    Args,
}

fn read_call(obj: &Map<String, Value>) -> Result<ToolCall, CallShape> {
    let tool = obj
        .get("tool")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(CallShape::Tool)?;
    let args = match obj.get("args") {
        None => Map::new(),
        Some(Value::Object(args)) => args.clone(),
        Some(_) => return Err(CallShape::Args),
    };
    Ok(ToolCall {
        tool: tool.to_string(),
        args,
    })
}
