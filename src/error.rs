//! Error types for orchestra-rs.
//!
//! Each layer owns a focused error enum. [`Error`] aggregates them for
//! callers that cross layers (CLI commands, pipeline and eval runners).
//!
//! Configuration and backend failures are the only errors a caller is
//! expected to see from a request. Malformed model output, coercion
//! problems and tool failures are recovered inside the agent layer.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Fatal configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Agent / backend failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Tool-layer failure.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Persistent storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Pipeline or eval suite document could not be loaded.
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Fatal configuration errors. Never retried, never recovered.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Live backend selected without a credential.
    #[error("missing API key: set OPENAI_API_KEY or enable mock mode")]
    ApiKeyMissing,

    /// Provider name is not one of the supported backends.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Requested provider name.
        name: String,
    },

    /// Any other invalid setting.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// Description of the problem.
        message: String,
    },
}

/// Errors raised while talking to a model backend.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Configuration problem discovered while building a backend.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The backend could not be reached or rejected the request.
    #[error("backend unavailable: {message}")]
    BackendUnavailable {
        /// Transport or API error message.
        message: String,
        /// HTTP status, when one was returned.
        status: Option<u16>,
    },

    /// Async runtime could not be created or driven.
    #[error("runtime error: {message}")]
    Runtime {
        /// Error detail.
        message: String,
    },
}

/// Tool registry and tool execution errors.
///
/// These are returned as values from [`ToolRegistry::call`](crate::tools::ToolRegistry::call);
/// the tool-invoking agent downgrades all of them to plain-text output.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A tool with this name is already registered.
    #[error("tool already registered: {name}")]
    DuplicateName {
        /// Conflicting tool name.
        name: String,
    },

    /// No tool is registered under this name.
    #[error("unknown tool: {name}")]
    UnknownTool {
        /// Requested tool name.
        name: String,
    },

    /// Path resolves outside the sandbox root.
    #[error("unsafe path: {path}")]
    UnsafePath {
        /// Path as supplied by the caller.
        path: String,
    },

    /// Arguments are unusable for this tool.
    #[error("invalid arguments for {name}: {message}")]
    InvalidArguments {
        /// Tool name.
        name: String,
        /// What was wrong.
        message: String,
    },

    /// Tool raised an internal failure.
    #[error("tool {name} failed: {message}")]
    Execution {
        /// Tool name.
        name: String,
        /// Failure detail.
        message: String,
    },
}

/// Persistent storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// `SQLite` error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Filesystem error while preparing the store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Another thread panicked while holding the connection.
    #[error("storage lock poisoned")]
    LockPoisoned,

    /// A stored row could not be interpreted.
    #[error("corrupt entry: {message}")]
    Corrupt {
        /// Description of the problem.
        message: String,
    },
}

/// Errors loading declarative pipeline or eval suite documents.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// File could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path of the document.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Document is not valid YAML for the expected schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Path of the document.
        path: String,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },
}

/// CLI command errors.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Invalid argument value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Command failed while running.
    #[error("command failed: {0}")]
    ExecutionFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_display() {
        let err = ToolError::UnknownTool {
            name: "nope".to_string(),
        };
        assert_eq!(err.to_string(), "unknown tool: nope");

        let err = ToolError::UnsafePath {
            path: "../x".to_string(),
        };
        assert_eq!(err.to_string(), "unsafe path: ../x");
    }

    #[test]
    fn test_config_error_converts_through_agent_error() {
        let agent: AgentError = ConfigError::ApiKeyMissing.into();
        assert!(matches!(agent, AgentError::Config(ConfigError::ApiKeyMissing)));

        let top: Error = agent.into();
        assert!(top.to_string().contains("missing API key"));
    }

    #[test]
    fn test_backend_unavailable_display() {
        let err = AgentError::BackendUnavailable {
            message: "connection refused".to_string(),
            status: None,
        };
        assert_eq!(err.to_string(), "backend unavailable: connection refused");
    }
}
