//! Rule-based scoring of routed responses.

use std::path::Path;

use regex::RegexBuilder;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value as YamlValue;
use tracing::{info, warn};

use crate::agent::router::Router;
use crate::definition::load_yaml;
use crate::error::Result;

/// Score a case must reach when it sets no `pass_score`.
pub const DEFAULT_PASS_SCORE: f64 = 0.75;

const fn default_pass_score() -> f64 {
    DEFAULT_PASS_SCORE
}
const fn default_match_penalty() -> f64 {
    0.7
}
const fn default_length_penalty() -> f64 {
    0.8
}
const fn default_max_words() -> usize {
    300
}

/// A scoring rule. Each violated rule multiplies the score by its penalty.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Rule {
    /// Output must contain `text` (case-sensitive).
    Contains {
        /// Required substring.
        #[serde(default)]
        text: String,
        /// Factor applied when missing.
        #[serde(default = "default_match_penalty", deserialize_with = "lenient_f64")]
        penalty: f64,
    },
    /// Output must match `pattern` (case-insensitive, multi-line).
    Regex {
        /// Pattern to search for.
        #[serde(default)]
        pattern: String,
        /// Factor applied when unmatched or invalid.
        #[serde(default = "default_match_penalty", deserialize_with = "lenient_f64")]
        penalty: f64,
    },
    /// Output must have at most `n` whitespace-separated words.
    MaxWords {
        /// Word limit.
        #[serde(default = "default_max_words", deserialize_with = "lenient_usize")]
        n: usize,
        /// Factor applied when exceeded.
        #[serde(default = "default_length_penalty", deserialize_with = "lenient_f64")]
        penalty: f64,
    },
    /// Unrecognised rule type; never violated.
    #[serde(other)]
    Unknown,
}

impl Rule {
    /// Returns the violation note and penalty if `output` breaks this rule.
    fn check(&self, output: &str) -> Option<(String, f64)> {
        match self {
            Self::Contains { text, penalty } => (!output.contains(text.as_str()))
                .then(|| (format!("missing contains: {text}"), *penalty)),
            Self::Regex { pattern, penalty } => {
                let matched = match RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .multi_line(true)
                    .build()
                {
                    Ok(re) => re.is_match(output),
                    Err(e) => {
                        warn!(pattern = %pattern, error = %e, "invalid regex rule counts as a violation");
                        false
                    }
                };
                (!matched).then(|| (format!("missing regex: {pattern}"), *penalty))
            }
            Self::MaxWords { n, penalty } => (output.split_whitespace().count() > *n)
                .then(|| (format!("too long: >{n} words"), *penalty)),
            Self::Unknown => None,
        }
    }
}

/// Scores `output` against `rules` in order.
///
/// The score starts at 1.0 and each violation multiplies it by the rule's
/// penalty, without clamping. Notes for violated rules are joined with
/// `"; "`.
#[must_use]
pub fn score_rules(output: &str, rules: &[Rule]) -> (f64, String) {
    let mut score = 1.0;
    let mut notes = Vec::new();
    for (note, penalty) in rules.iter().filter_map(|r| r.check(output)) {
        score *= penalty;
        notes.push(note);
    }
    (score, notes.join("; "))
}

/// One evaluation case.
#[derive(Debug, Clone, Deserialize)]
pub struct EvalCase {
    /// Case identifier. Scalars are stringified; a missing id is
    /// replaced by the case's 1-based position.
    #[serde(default, deserialize_with = "scalar_id")]
    pub id: Option<String>,
    /// Prompt sent through the router.
    #[serde(default)]
    pub prompt: String,
    /// Rules applied to the response, in order.
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Minimum score to pass.
    #[serde(default = "default_pass_score", deserialize_with = "lenient_f64")]
    pub pass_score: f64,
}

fn scalar_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<YamlValue>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(YamlValue::Null) => None,
        Some(YamlValue::String(s)) => Some(s),
        Some(YamlValue::Bool(b)) => Some(b.to_string()),
        Some(YamlValue::Number(n)) => Some(n.to_string()),
        Some(other) => serde_yaml::to_string(&other)
            .ok()
            .map(|s| s.trim_end().to_string()),
    })
}

/// Reads a number written either as a YAML number or a numeric string.
fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match YamlValue::deserialize(deserializer)? {
        YamlValue::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom(format!("not a number: {n}"))),
        YamlValue::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("not a number: {s:?}"))),
        other => Err(D::Error::custom(format!("expected a number, got {other:?}"))),
    }
}

/// Reads a count written as an integer, a float (truncated) or a numeric string.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_usize<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let invalid = |text: String| D::Error::custom(format!("not a word count: {text}"));
    match YamlValue::deserialize(deserializer)? {
        YamlValue::Number(n) => {
            if let Some(v) = n.as_u64() {
                usize::try_from(v).map_err(|_| invalid(n.to_string()))
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() && f >= 0.0 => Ok(f as usize),
                    _ => Err(invalid(n.to_string())),
                }
            }
        }
        YamlValue::String(s) => s.trim().parse().map_err(|_| invalid(format!("{s:?}"))),
        other => Err(invalid(format!("{other:?}"))),
    }
}

/// An evaluation suite document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvalSuite {
    /// Cases in execution order.
    #[serde(default)]
    pub cases: Vec<EvalCase>,
}

/// Outcome of one case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseResult {
    /// Case identifier.
    pub id: String,
    /// Whether `score >= pass_score`.
    pub passed: bool,
    /// Final multiplicative score.
    pub score: f64,
    /// Violated-rule notes joined with `"; "`.
    pub notes: String,
    /// Routed response text.
    pub output: String,
}

/// Runs eval suites through a router.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    router: &'a Router,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator.
    #[must_use]
    pub const fn new(router: &'a Router) -> Self {
        Self { router }
    }

    /// Loads a suite document and runs it.
    ///
    /// # Errors
    ///
    /// Returns a definition error if the suite cannot be loaded, and
    /// propagates backend failures.
    pub async fn run_suite_file(&self, path: &Path) -> Result<Vec<CaseResult>> {
        let suite: EvalSuite = load_yaml(path)?;
        self.run_suite(&suite).await
    }

    /// Runs every case in order.
    ///
    /// # Errors
    ///
    /// Stops at the first backend failure.
    pub async fn run_suite(&self, suite: &EvalSuite) -> Result<Vec<CaseResult>> {
        let mut results = Vec::with_capacity(suite.cases.len());
        for (index, case) in suite.cases.iter().enumerate() {
            let id = case
                .id
                .clone()
                .unwrap_or_else(|| (index + 1).to_string());
            let output = self.router.run(&case.prompt).await?.text;
            let (score, notes) = score_rules(&output, &case.rules);
            let passed = score >= case.pass_score;
            info!(case = %id, score, passed, "scored eval case");
            results.push(CaseResult {
                id,
                passed,
                score,
                notes,
                output,
            });
        }
        Ok(results)
    }
}
