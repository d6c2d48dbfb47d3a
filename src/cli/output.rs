//! Output rendering for CLI commands.

use std::fmt::Write;

use serde::Serialize;

use crate::agent::{AgentResponse, ChatMessage, RouteDecision};
use crate::eval::CaseResult;
use crate::memory::MemoryItem;
use crate::pipeline::StepResult;
use crate::report::{Report, ReportSection, code_block, md_table};
use crate::tools::ToolSpec;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name; anything but `json` is text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }

    /// Serialises `value` as pretty JSON with a trailing newline.
    #[must_use]
    pub fn to_json<T: Serialize + ?Sized>(self, value: &T) -> String {
        serde_json::to_string_pretty(value)
            .map_or_else(|e| format!("{{\"error\": \"{e}\"}}\n"), |s| s + "\n")
    }
}

/// Formats the tool listing.
#[must_use]
pub fn format_tools<'a>(specs: impl Iterator<Item = &'a ToolSpec>, format: OutputFormat) -> String {
    let specs: Vec<&ToolSpec> = specs.collect();
    match format {
        OutputFormat::Text => {
            let width = specs.iter().map(|s| s.name.len()).max().unwrap_or(0);
            let mut out = String::new();
            for spec in &specs {
                let _ = writeln!(out, "{:<width$}  {}", spec.name, spec.description);
            }
            out
        }
        OutputFormat::Json => format.to_json(&specs),
    }
}

/// Formats a routing decision.
#[must_use]
pub fn format_decision(decision: &RouteDecision, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("agent: {}\nreason: {}\n", decision.agent, decision.reason),
        OutputFormat::Json => format.to_json(decision),
    }
}

/// Formats one agent response.
#[must_use]
pub fn format_response(response: &AgentResponse, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let agent = response
                .metadata
                .get("agent")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("?");
            let reason = response
                .metadata
                .get("route_reason")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("");
            let mut out = format!("[{agent}]");
            if !reason.is_empty() {
                let _ = write!(out, " {reason}");
            }
            let _ = write!(out, "\n\n{}\n", response.text.trim_end());
            out
        }
        OutputFormat::Json => format.to_json(response),
    }
}

/// Formats pipeline step results.
#[must_use]
pub fn format_steps(results: &[StepResult], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = String::new();
            for r in results {
                let _ = write!(out, "== step: {} ==\n{}\n\n", r.name, r.output.trim_end());
            }
            out
        }
        OutputFormat::Json => format.to_json(results),
    }
}

/// Formats eval results with a pass summary.
#[must_use]
pub fn format_eval(results: &[CaseResult], show_failures: bool, format: OutputFormat) -> String {
    let passed = results.iter().filter(|r| r.passed).count();
    match format {
        OutputFormat::Text => {
            let mut out = format!("Eval results: {passed}/{} passed\n\n", results.len());
            for r in results {
                let _ = writeln!(
                    out,
                    "{:<12} {:<4} {:.2}  {}",
                    r.id,
                    if r.passed { "yes" } else { "no" },
                    r.score,
                    r.notes
                );
            }
            if show_failures {
                for r in results.iter().filter(|r| !r.passed) {
                    let _ = write!(
                        out,
                        "\n== FAIL {} ({}) ==\n{}\n",
                        r.id,
                        r.notes,
                        r.output.trim_end()
                    );
                }
            }
            out
        }
        OutputFormat::Json => format.to_json(&serde_json::json!({
            "passed": passed,
            "total": results.len(),
            "results": results,
        })),
    }
}

/// Formats a session's messages.
#[must_use]
pub fn format_history(session: &str, messages: &[ChatMessage], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if messages.is_empty() {
                return format!("Session '{session}' has no messages.\n");
            }
            let mut out = String::new();
            for m in messages {
                let _ = writeln!(out, "{}: {}", m.role, m.content);
            }
            out
        }
        OutputFormat::Json => format.to_json(&serde_json::json!({
            "session": session,
            "messages": messages,
        })),
    }
}

/// Formats ranked search hits.
#[must_use]
pub fn format_search_hits(hits: &[(&MemoryItem, f64)], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if hits.is_empty() {
                return "No matching messages.\n".to_string();
            }
            let mut out = String::new();
            for (item, score) in hits {
                let _ = writeln!(out, "{score:.3}  [{}] {}", item.id, item.text);
            }
            out
        }
        OutputFormat::Json => {
            let rows: Vec<_> = hits
                .iter()
                .map(|(item, score)| serde_json::json!({ "item": item, "score": score }))
                .collect();
            format.to_json(&rows)
        }
    }
}

/// Formats the list of known sessions.
#[must_use]
pub fn format_sessions(sessions: &[String], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if sessions.is_empty() {
                return "No sessions recorded.\n".to_string();
            }
            sessions.iter().map(|s| format!("{s}\n")).collect()
        }
        OutputFormat::Json => format.to_json(sessions),
    }
}

/// Builds the Markdown report for a pipeline run.
#[must_use]
pub fn pipeline_report(task: &str, session: &str, results: &[StepResult]) -> Report {
    results.iter().fold(
        Report::new("Pipeline run")
            .meta("task", task)
            .meta("session", session)
            .meta("steps", results.len()),
        |report, r| report.section(ReportSection::new(format!("Step: {}", r.name), &r.output)),
    )
}

/// Builds the Markdown report for an eval run.
#[must_use]
pub fn eval_report(suite: &str, results: &[CaseResult]) -> Report {
    let passed = results.iter().filter(|r| r.passed).count();
    let rows: Vec<Vec<String>> = results
        .iter()
        .map(|r| {
            vec![
                r.id.clone(),
                if r.passed { "yes" } else { "no" }.to_string(),
                format!("{:.2}", r.score),
                r.notes.clone(),
            ]
        })
        .collect();
    let table = md_table(&["id", "passed", "score", "notes"], &rows);

    results.iter().filter(|r| !r.passed).fold(
        Report::new("Eval run")
            .meta("suite", suite)
            .meta("passed", format!("{passed}/{}", results.len()))
            .section(ReportSection::new("Results", table)),
        |report, r| {
            report.section(ReportSection::new(
                format!("Failure: {}", r.id),
                code_block("text", r.output.trim_end()),
            ))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Specialist;

    fn case(id: &str, passed: bool) -> CaseResult {
        CaseResult {
            id: id.to_string(),
            passed,
            score: if passed { 1.0 } else { 0.49 },
            notes: if passed { String::new() } else { "missing contains: x".to_string() },
            output: format!("output {id}"),
        }
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("yaml"), OutputFormat::Text);
    }

    #[test]
    fn test_format_decision() {
        let decision = RouteDecision {
            agent: Specialist::ToolUser,
            reason: "math".to_string(),
        };
        assert_eq!(
            format_decision(&decision, OutputFormat::Text),
            "agent: tool_user\nreason: math\n"
        );
        assert!(format_decision(&decision, OutputFormat::Json).contains("\"tool_user\""));
    }

    #[test]
    fn test_format_eval_shows_failures_on_request() {
        let results = [case("a", true), case("b", false)];
        let plain = format_eval(&results, false, OutputFormat::Text);
        assert!(plain.starts_with("Eval results: 1/2 passed"));
        assert!(!plain.contains("FAIL b"));

        let detailed = format_eval(&results, true, OutputFormat::Text);
        assert!(detailed.contains("== FAIL b (missing contains: x) ==\noutput b"));
    }

    #[test]
    fn test_eval_report_lists_failures() {
        let rendered = eval_report("suite.yaml", &[case("a", true), case("b", false)]).render();
        assert!(rendered.contains("| passed | 1/2 |"));
        assert!(rendered.contains("| b | no | 0.49 | missing contains: x |"));
        assert!(rendered.contains("## Failure: b\n```text\noutput b\n```"));
        assert!(!rendered.contains("## Failure: a"));
    }
}
