//! Markdown reports for pipeline and eval runs.

use chrono::{DateTime, SecondsFormat, Utc};

/// Footer line closing every report.
const REPORT_FOOTER: &str = "orchestra-rs report";

/// Renders a Markdown table.
#[must_use]
pub fn md_table<S: AsRef<str>>(headers: &[&str], rows: &[Vec<S>]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format!("| {} |", headers.join(" | ")));
    lines.push(format!("| {} |", vec!["---"; headers.len()].join(" | ")));
    for row in rows {
        let cells: Vec<&str> = row.iter().map(AsRef::as_ref).collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }
    lines.join("\n")
}

/// Wraps `code` in a fenced block tagged `lang`.
#[must_use]
pub fn code_block(lang: &str, code: &str) -> String {
    format!("```{lang}\n{code}\n```")
}

/// A titled report section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    /// Section heading.
    pub title: String,
    /// Markdown body; surrounding whitespace is trimmed on render.
    pub body: String,
}

impl ReportSection {
    /// Creates a section.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// A Markdown report: title, metadata table and sections.
#[derive(Debug, Clone, Default)]
pub struct Report {
    title: String,
    metadata: Vec<(String, String)>,
    sections: Vec<ReportSection>,
}

impl Report {
    /// Starts a report with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Adds a metadata row. Rows keep insertion order.
    #[must_use]
    pub fn meta(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.push((key.into(), value.to_string()));
        self
    }

    /// Appends a section.
    #[must_use]
    pub fn section(mut self, section: ReportSection) -> Self {
        self.sections.push(section);
        self
    }

    /// Renders with the current time.
    #[must_use]
    pub fn render(&self) -> String {
        self.render_at(Utc::now())
    }

    /// Renders with a fixed generation time.
    #[must_use]
    pub fn render_at(&self, generated: DateTime<Utc>) -> String {
        let mut lines = vec![
            format!("# {}", self.title),
            String::new(),
            format!(
                "_Generated: {}_",
                generated.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
            String::new(),
        ];
        if !self.metadata.is_empty() {
            let rows: Vec<Vec<&str>> = self
                .metadata
                .iter()
                .map(|(k, v)| vec![k.as_str(), v.as_str()])
                .collect();
            lines.push("## Metadata".to_string());
            lines.push(md_table(&["key", "value"], &rows));
            lines.push(String::new());
        }
        for section in &self.sections {
            lines.push(format!("## {}", section.title));
            lines.push(section.body.trim().to_string());
            lines.push(String::new());
        }
        lines.push("---".to_string());
        lines.push(REPORT_FOOTER.to_string());
        lines.join("\n")
    }
}
