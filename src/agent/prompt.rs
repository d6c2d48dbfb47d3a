//! System prompts for the router and the specialist variants.
//!
//! Prompts are opaque per-variant configuration. Each can be overridden by
//! a markdown file in the prompt directory; missing files fall back to the
//! compiled-in defaults below.

use std::path::{Path, PathBuf};

use super::specialist::Specialist;

/// System prompt for the routing decision call.
pub const ROUTER_SYSTEM_PROMPT: &str = r#"Route the user request to one agent: planner, writer, analyst, tool_user. Return STRICT JSON: {"agent":"...","reason":"..."}. Use tool_user if math, file operations, or fetching a url is needed."#;

/// System prompt for the planner variant.
pub const PLANNER_SYSTEM_PROMPT: &str =
    "You are a planning assistant. Produce a numbered plan with checkpoints and risk notes.";

/// System prompt for the writer variant.
pub const WRITER_SYSTEM_PROMPT: &str =
    "You are a writing assistant. Produce a polished, structured deliverable.";

/// System prompt for the analyst variant.
pub const ANALYST_SYSTEM_PROMPT: &str = "You are an analyst. Be precise. Show assumptions. Use bullet points and small tables when useful.";

/// System prompt prefix for the tool-invoking variant.
///
/// The registered tool names are appended at call time, after a space.
pub const TOOL_USER_SYSTEM_PROMPT: &str = "You can use tools by outputting JSON with keys: tool, args. If no tool needed, output plain text. Available tools:";

/// Default prompt directory under the user's home.
const DEFAULT_PROMPT_DIR: &str = ".config/orchestra-rs/prompts";

/// Environment variable naming a prompt directory.
const PROMPT_DIR_ENV: &str = "ORCHESTRA_PROMPT_DIR";

const ROUTER_FILENAME: &str = "router.md";
const PLANNER_FILENAME: &str = "planner.md";
const WRITER_FILENAME: &str = "writer.md";
const ANALYST_FILENAME: &str = "analyst.md";
const TOOL_USER_FILENAME: &str = "tool_user.md";

/// A set of system prompts for the router and every specialist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// Routing decision instruction.
    pub router: String,
    /// Planner instruction.
    pub planner: String,
    /// Writer instruction.
    pub writer: String,
    /// Analyst instruction.
    pub analyst: String,
    /// Tool-invoker instruction prefix.
    pub tool_user: String,
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in defaults.
    ///
    /// Resolution order for the directory:
    /// 1. Explicit `prompt_dir` argument (from `--prompt-dir`)
    /// 2. `ORCHESTRA_PROMPT_DIR` environment variable
    /// 3. `~/.config/orchestra-rs/prompts/`
    ///
    /// Each file is loaded independently; a missing file uses its default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(PathBuf::from)
            .or_else(|| std::env::var(PROMPT_DIR_ENV).ok().map(PathBuf::from))
            .or_else(Self::default_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(path).ok())
                .map(|text| text.trim_end().to_string())
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            router: load_file(ROUTER_FILENAME, ROUTER_SYSTEM_PROMPT),
            planner: load_file(PLANNER_FILENAME, PLANNER_SYSTEM_PROMPT),
            writer: load_file(WRITER_FILENAME, WRITER_SYSTEM_PROMPT),
            analyst: load_file(ANALYST_FILENAME, ANALYST_SYSTEM_PROMPT),
            tool_user: load_file(TOOL_USER_FILENAME, TOOL_USER_SYSTEM_PROMPT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            router: ROUTER_SYSTEM_PROMPT.to_string(),
            planner: PLANNER_SYSTEM_PROMPT.to_string(),
            writer: WRITER_SYSTEM_PROMPT.to_string(),
            analyst: ANALYST_SYSTEM_PROMPT.to_string(),
            tool_user: TOOL_USER_SYSTEM_PROMPT.to_string(),
        }
    }

    /// System instruction for a specialist variant.
    #[must_use]
    pub fn for_specialist(&self, kind: Specialist) -> &str {
        match kind {
            Specialist::Planner => &self.planner,
            Specialist::Writer => &self.writer,
            Specialist::Analyst => &self.analyst,
            Specialist::ToolUser => &self.tool_user,
        }
    }

    /// Writes the compiled-in default prompts to the given directory.
    ///
    /// Creates the directory if it does not exist. Existing files are
    /// **not** overwritten.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let templates = [
            (ROUTER_FILENAME, ROUTER_SYSTEM_PROMPT),
            (PLANNER_FILENAME, PLANNER_SYSTEM_PROMPT),
            (WRITER_FILENAME, WRITER_SYSTEM_PROMPT),
            (ANALYST_FILENAME, ANALYST_SYSTEM_PROMPT),
            (TOOL_USER_FILENAME, TOOL_USER_SYSTEM_PROMPT),
        ];

        let mut written = Vec::new();
        for (filename, content) in &templates {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, format!("{content}\n"))?;
                written.push(path);
            }
        }

        Ok(written)
    }

    /// Returns the default prompt directory under the user's home.
    ///
    /// Returns `None` if the home directory cannot be determined.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_not_empty() {
        let set = PromptSet::defaults();
        for kind in Specialist::ALL {
            assert!(!set.for_specialist(kind).is_empty());
        }
        assert!(set.router.contains("tool_user"));
    }

    #[test]
    fn test_tool_user_prompt_has_no_braces() {
        // Braces in the echoed instruction would look like a tool call in mock mode.
        assert!(!TOOL_USER_SYSTEM_PROMPT.contains('{'));
        assert!(!TOOL_USER_SYSTEM_PROMPT.contains('['));
    }

    #[test]
    fn test_load_overrides_individual_files() {
        let dir = tempfile::TempDir::new().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        std::fs::write(dir.path().join("planner.md"), "Plan carefully.\n")
            .unwrap_or_else(|e| panic!("write failed: {e}"));

        let set = PromptSet::load(Some(dir.path()));
        assert_eq!(set.planner, "Plan carefully.");
        assert_eq!(set.writer, WRITER_SYSTEM_PROMPT);
    }

    #[test]
    fn test_write_defaults_does_not_overwrite() {
        let dir = tempfile::TempDir::new().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        std::fs::write(dir.path().join("writer.md"), "custom")
            .unwrap_or_else(|e| panic!("write failed: {e}"));

        let written =
            PromptSet::write_defaults(dir.path()).unwrap_or_else(|e| panic!("scaffold failed: {e}"));
        assert_eq!(written.len(), 4);

        let set = PromptSet::load(Some(dir.path()));
        assert_eq!(set.writer, "custom");
        assert_eq!(set, PromptSet {
            writer: "custom".to_string(),
            ..PromptSet::defaults()
        });
    }
}
