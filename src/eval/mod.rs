//! Evaluation suites.
//!
//! A suite lists prompts together with scoring rules. Each prompt is run
//! through the router and its response scored; a case passes when the
//! score reaches its `pass_score`.

mod harness;

pub use harness::{
    CaseResult, DEFAULT_PASS_SCORE, EvalCase, EvalSuite, Evaluator, Rule, score_rules,
};
