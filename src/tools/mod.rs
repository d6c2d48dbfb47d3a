//! Tool registry, tool-call parsing, argument coercion and built-in tools.

mod builtins;
pub mod calc;
pub mod parser;
mod registry;
pub mod sandbox;
pub mod schema;

pub use builtins::install_builtin_tools;
pub use parser::{ParseOutcome, ToolBatch, ToolCall, extract_candidate, parse_tool_output};
pub use registry::{FnTool, ToolArgs, ToolHandler, ToolRegistry, ToolSpec};
pub use sandbox::Sandbox;
pub use schema::{CoercedArgs, ToolSchema, ValueKind, coerce_args};
