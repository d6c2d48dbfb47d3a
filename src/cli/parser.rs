//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::agent::OrchestraConfig;
use crate::error::ConfigError;
use crate::pipeline::DEFAULT_PIPELINE_SESSION;

/// Orchestra: routes queries to specialist LLM agents.
///
/// Queries are routed to a planner, writer, analyst or tool-using agent.
/// Model responses are cached on disk; mock mode runs fully offline.
#[derive(Parser, Debug)]
#[command(name = "orchestra-rs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory for session history and the file-tool sandbox.
    #[arg(long, global = true, env = "ORCHESTRA_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory for the response cache.
    #[arg(long, global = true, env = "ORCHESTRA_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Model identifier.
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Use the offline mock backend.
    #[arg(long, global = true, conflicts_with = "live")]
    pub mock: bool,

    /// Use the live backend (requires `OPENAI_API_KEY`).
    #[arg(long, global = true)]
    pub live: bool,

    /// Directory containing custom prompt templates.
    #[arg(long, global = true)]
    pub prompt_dir: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Resolves configuration: flags first, then environment, then defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for live mode without a key.
    pub fn config(&self) -> Result<OrchestraConfig, ConfigError> {
        let mut builder = OrchestraConfig::builder();
        if let Some(dir) = &self.data_dir {
            builder = builder.data_dir(dir);
        }
        if let Some(dir) = &self.cache_dir {
            builder = builder.cache_dir(dir);
        }
        if let Some(model) = &self.model {
            builder = builder.model(model);
        }
        if let Some(dir) = &self.prompt_dir {
            builder = builder.prompt_dir(dir);
        }
        if self.mock {
            builder = builder.mock_mode(true);
        } else if self.live {
            builder = builder.mock_mode(false);
        }
        builder.from_env().build()
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered tools.
    Tools,

    /// Show which agent a query would be routed to, without running it.
    Route {
        /// Query text.
        query: String,
    },

    /// Route one query and print the answer.
    #[command(after_help = r#"Examples:
  orchestra-rs ask "Plan a three-day trip to Lisbon"
  orchestra-rs ask "calculate (2+3)*4"
  orchestra-rs --format json ask "Compare tea and coffee" | jq .metadata
"#)]
    Ask {
        /// Query text.
        query: String,

        /// Session to record the exchange in.
        #[arg(short, long, default_value = "default")]
        session: String,
    },

    /// Interactive chat. Type /exit to quit, /new to start a new session.
    Chat {
        /// Session id.
        #[arg(short, long, default_value = "chat")]
        session: String,
    },

    /// Run a multi-step YAML pipeline.
    Run {
        /// Pipeline file.
        #[arg(short, long)]
        task: PathBuf,

        /// Session to record the steps in.
        #[arg(short, long, default_value = DEFAULT_PIPELINE_SESSION)]
        session: String,

        /// Also write a Markdown report to this path.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Run an evaluation suite.
    Eval {
        /// Suite file.
        #[arg(short, long)]
        suite: PathBuf,

        /// Include the output of failed cases.
        #[arg(long)]
        show_failures: bool,

        /// Also write a Markdown report to this path.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show session history, or rank it against a search query.
    History {
        /// Session id. Lists known sessions when omitted.
        #[arg(short, long)]
        session: Option<String>,

        /// Rank messages by similarity to this text.
        #[arg(long)]
        search: Option<String>,

        /// Maximum number of search results.
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,
    },

    /// Prompt template operations.
    #[command(subcommand)]
    Prompts(PromptsCommands),
}

/// Prompt template subcommands.
#[derive(Subcommand, Debug)]
pub enum PromptsCommands {
    /// Write the default prompt templates to a directory.
    ///
    /// Existing files are left untouched.
    Init {
        /// Target directory (defaults to ~/.config/orchestra-rs/prompts).
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "orchestra-rs",
            "ask",
            "hello",
            "--mock",
            "--data-dir",
            "/tmp/x",
            "--format",
            "json",
        ])
        .unwrap_or_else(|e| panic!("parse failed: {e}"));
        assert!(cli.mock);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));
        assert!(matches!(cli.command, Commands::Ask { ref session, .. } if session == "default"));
    }

    #[test]
    fn test_mock_and_live_conflict() {
        let result = Cli::try_parse_from(["orchestra-rs", "--mock", "--live", "tools"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_run_defaults_to_pipeline_session() {
        let cli = Cli::try_parse_from(["orchestra-rs", "run", "--task", "p.yaml"])
            .unwrap_or_else(|e| panic!("parse failed: {e}"));
        assert!(matches!(cli.command, Commands::Run { ref session, .. } if session == "pipeline"));
    }

    #[test]
    fn test_explicit_flags_override_environment() {
        let cli = Cli::try_parse_from([
            "orchestra-rs",
            "--mock",
            "--model",
            "flag-model",
            "--cache-dir",
            "/tmp/c",
            "tools",
        ])
        .unwrap_or_else(|e| panic!("parse failed: {e}"));
        let config = cli.config().unwrap_or_else(|e| panic!("config failed: {e}"));
        assert!(config.mock_mode);
        assert_eq!(config.model, "flag-model");
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/c"));
    }
}
