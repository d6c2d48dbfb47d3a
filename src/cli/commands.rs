//! CLI command implementations.
//!
//! Each command assembles an [`AppContext`], drives the async core on a
//! tokio runtime and returns its rendered output.

use std::io::{self, BufRead, Write as IoWrite};
use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::agent::{PromptSet, Role};
use crate::cli::output::{
    OutputFormat, eval_report, format_decision, format_eval, format_history, format_response,
    format_search_hits, format_sessions, format_steps, format_tools, pipeline_report,
};
use crate::cli::parser::{Cli, Commands, PromptsCommands};
use crate::context::AppContext;
use crate::error::{CommandError, Result};
use crate::eval::Evaluator;
use crate::memory::{MemoryItem, TinyVectorIndex};
use crate::pipeline::PipelineRunner;
use crate::report::Report;
use crate::storage::SessionLog;

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if configuration is unusable, the backend fails, or
/// the command cannot complete.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Tools => Ok(format_tools(bootstrap(cli)?.tools.specs(), format)),
        Commands::Route { query } => cmd_route(&bootstrap(cli)?, query, format),
        Commands::Ask { query, session } => cmd_ask(&bootstrap(cli)?, query, session, format),
        Commands::Chat { session } => cmd_chat(&bootstrap(cli)?, session),
        Commands::Run {
            task,
            session,
            report,
        } => cmd_run(&bootstrap(cli)?, task, session, report.as_deref(), format),
        Commands::Eval {
            suite,
            show_failures,
            report,
        } => cmd_eval(
            &bootstrap(cli)?,
            suite,
            *show_failures,
            report.as_deref(),
            format,
        ),
        Commands::History {
            session,
            search,
            top_k,
        } => cmd_history(
            &bootstrap(cli)?,
            session.as_deref(),
            search.as_deref(),
            *top_k,
            format,
        ),
        Commands::Prompts(PromptsCommands::Init { dir }) => {
            cmd_init_prompts(dir.as_deref(), format)
        }
    }
}

/// Resolves configuration and assembles the application.
fn bootstrap(cli: &Cli) -> Result<AppContext> {
    AppContext::bootstrap(cli.config()?)
}

/// Creates the runtime that drives async calls.
fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

fn cmd_route(ctx: &AppContext, query: &str, format: OutputFormat) -> Result<String> {
    let decision = runtime()?.block_on(ctx.router.decide(query))?;
    Ok(format_decision(&decision, format))
}

fn cmd_ask(ctx: &AppContext, query: &str, session: &str, format: OutputFormat) -> Result<String> {
    ctx.sessions.append(session, Role::User, query)?;
    let response = runtime()?.block_on(ctx.router.run(query))?;
    ctx.sessions.append(session, Role::Assistant, &response.text)?;
    Ok(format_response(&response, format))
}

fn cmd_chat(ctx: &AppContext, session: &str) -> Result<String> {
    let rt = runtime()?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let io_err = |e: io::Error| CommandError::ExecutionFailed(format!("Terminal I/O failed: {e}"));

    writeln!(stdout, "Type /exit to quit. Type /new to start a new session.").map_err(io_err)?;
    let mut session_id = session.to_string();
    let mut lines = stdin.lock().lines();
    loop {
        write!(stdout, "you> ").map_err(io_err)?;
        stdout.flush().map_err(io_err)?;
        let Some(line) = lines.next() else {
            break;
        };
        let message = line.map_err(io_err)?;
        let message = message.trim();
        match message {
            "" => continue,
            "/exit" => break,
            "/new" => {
                let id = uuid::Uuid::new_v4().simple().to_string();
                session_id = format!("chat-{}", &id[..8]);
                writeln!(stdout, "new session: {session_id}").map_err(io_err)?;
                continue;
            }
            _ => {}
        }

        ctx.sessions.append(&session_id, Role::User, message)?;
        let response = rt.block_on(ctx.router.run(message))?;
        ctx.sessions.append(&session_id, Role::Assistant, &response.text)?;
        write!(stdout, "{}", format_response(&response, OutputFormat::Text)).map_err(io_err)?;
    }
    Ok(String::new())
}

fn cmd_run(
    ctx: &AppContext,
    task: &Path,
    session: &str,
    report: Option<&Path>,
    format: OutputFormat,
) -> Result<String> {
    let runner = PipelineRunner::new(&ctx.router, ctx.sessions.as_ref());
    let results = runtime()?.block_on(runner.run_file(task, session))?;

    let mut output = format_steps(&results, format);
    if let Some(path) = report {
        let task_name = task.display().to_string();
        write_report(path, &pipeline_report(&task_name, session, &results))?;
        if format == OutputFormat::Text {
            output.push_str(&format!("Report written to: {}\n", path.display()));
        }
    }
    Ok(output)
}

fn cmd_eval(
    ctx: &AppContext,
    suite: &Path,
    show_failures: bool,
    report: Option<&Path>,
    format: OutputFormat,
) -> Result<String> {
    let evaluator = Evaluator::new(&ctx.router);
    let results = runtime()?.block_on(evaluator.run_suite_file(suite))?;

    let mut output = format_eval(&results, show_failures, format);
    if let Some(path) = report {
        write_report(path, &eval_report(&suite.display().to_string(), &results))?;
        if format == OutputFormat::Text {
            output.push_str(&format!("\nReport written to: {}\n", path.display()));
        }
    }
    Ok(output)
}

fn cmd_history(
    ctx: &AppContext,
    session: Option<&str>,
    search: Option<&str>,
    top_k: usize,
    format: OutputFormat,
) -> Result<String> {
    let sessions = match session {
        Some(id) => vec![id.to_string()],
        None => ctx.sessions.list_sessions()?,
    };

    let Some(query) = search else {
        return match session {
            Some(id) => Ok(format_history(id, &ctx.sessions.load(id)?, format)),
            None => Ok(format_sessions(&sessions, format)),
        };
    };

    let mut index = TinyVectorIndex::new();
    for id in &sessions {
        for (position, message) in ctx.sessions.load(id)?.into_iter().enumerate() {
            let mut meta = Map::new();
            meta.insert("session".to_string(), Value::String(id.clone()));
            meta.insert("role".to_string(), Value::String(message.role.to_string()));
            index.add(MemoryItem {
                id: format!("{id}#{position}"),
                text: message.content,
                meta,
            });
        }
    }
    debug!(indexed = index.len(), "searching session history");
    Ok(format_search_hits(&index.search(query, top_k), format))
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(std::path::PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                output.push_str(&format!(
                    "  {}\n",
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("unknown")
                ));
            }
            output.push_str("\nEdit these files to customize agent system prompts.\n");
            Ok(output)
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json))
        }
    }
}

fn write_report(path: &Path, report: &Report) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            CommandError::ExecutionFailed(format!("Failed to create report directory: {e}"))
        })?;
    }
    std::fs::write(path, report.render() + "\n")
        .map_err(|e| CommandError::ExecutionFailed(format!("Failed to write report: {e}")))?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn run(dir: &TempDir, args: &[&str]) -> Result<String> {
        let data = dir.path().join("data");
        let cache = dir.path().join("cache");
        let prompts = dir.path().join("prompts");
        let mut argv = vec![
            "orchestra-rs".to_string(),
            "--mock".to_string(),
            "--data-dir".to_string(),
            data.display().to_string(),
            "--cache-dir".to_string(),
            cache.display().to_string(),
            "--prompt-dir".to_string(),
            prompts.display().to_string(),
        ];
        argv.extend(args.iter().map(ToString::to_string));
        let cli = Cli::try_parse_from(argv).unwrap_or_else(|e| panic!("parse failed: {e}"));
        execute(&cli)
    }

    #[test]
    fn test_route_uses_heuristic_in_mock_mode() {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let out = run(&dir, &["route", "give me a roadmap"]).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(out, "agent: planner\nreason: heuristic: planning keywords\n");
    }

    #[test]
    fn test_ask_records_history_and_search_finds_it() {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let out = run(&dir, &["ask", "--session", "s1", "write about volcanoes"])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(out.starts_with("[writer] heuristic fallback"));
        assert!(out.contains("MOCK_MODE RESPONSE"));

        let history = run(&dir, &["history", "--session", "s1"]).unwrap_or_else(|e| panic!("{e}"));
        assert!(history.starts_with("user: write about volcanoes\nassistant: MOCK_MODE RESPONSE"));

        let sessions = run(&dir, &["history"]).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(sessions, "s1\n");

        let hits = run(&dir, &["history", "--search", "volcanoes", "-k", "1"])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(hits.contains("[s1#0] write about volcanoes"));
    }

    #[test]
    fn test_run_pipeline_writes_report() {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let task = dir.path().join("task.yaml");
        std::fs::write(
            &task,
            "steps:\n  - name: outline\n    prompt: plan a talk\n  - name: draft\n    prompt: 'expand {{outline}}'\n",
        )
        .unwrap_or_else(|e| panic!("write failed: {e}"));
        let report = dir.path().join("out").join("report.md");

        let out = run(&dir, &[
            "run",
            "--task",
            &task.display().to_string(),
            "--report",
            &report.display().to_string(),
        ])
        .unwrap_or_else(|e| panic!("{e}"));
        assert!(out.contains("== step: outline =="));
        assert!(out.contains("== step: draft =="));

        let text = std::fs::read_to_string(&report).unwrap_or_else(|e| panic!("read failed: {e}"));
        assert!(text.starts_with("# Pipeline run"));
        assert!(text.contains("## Step: draft"));
    }

    #[test]
    fn test_eval_json_output() {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let suite = dir.path().join("suite.yaml");
        std::fs::write(
            &suite,
            "cases:\n  - id: mock\n    prompt: hello\n    rules:\n      - type: contains\n        text: MOCK_MODE\n  - id: absent\n    prompt: hello\n    rules:\n      - type: contains\n        text: zebra\n        penalty: 0.5\n",
        )
        .unwrap_or_else(|e| panic!("write failed: {e}"));

        let out = run(&dir, &["--format", "json", "eval", "--suite", &suite.display().to_string()])
            .unwrap_or_else(|e| panic!("{e}"));
        let value: Value = serde_json::from_str(&out).unwrap_or_else(|e| panic!("bad json: {e}"));
        assert_eq!(value["passed"], 1);
        assert_eq!(value["total"], 2);
        assert_eq!(value["results"][1]["notes"], "missing contains: zebra");
    }

    #[test]
    fn test_missing_pipeline_is_an_error() {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let result = run(&dir, &["run", "--task", "/nonexistent/task.yaml"]);
        assert!(matches!(result, Err(crate::error::Error::Definition(_))));
    }

    #[test]
    fn test_prompts_init_does_not_overwrite() {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let target = dir.path().join("p");
        let target_arg = target.display().to_string();

        let first = run(&dir, &["prompts", "init", "--dir", &target_arg])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(first.starts_with("Wrote 5 prompt template(s)"));

        let second = run(&dir, &["prompts", "init", "--dir", &target_arg])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(second.starts_with("All prompt templates already exist"));
    }
}
