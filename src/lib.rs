//! # orchestra-rs
//!
//! Agent orchestration core. A [`Router`](agent::Router) sends each query
//! to one of four specialist agents (planner, writer, analyst, tool user).
//! Model calls go through a content-addressed response cache, tool calls
//! are parsed from free text and run against a sandboxed registry, and
//! multi-step pipelines and rule-scored eval suites are driven from YAML.
//!
//! ## Example
//!
//! ```no_run
//! use orchestra_rs::agent::OrchestraConfig;
//! use orchestra_rs::context::AppContext;
//!
//! # async fn demo() -> orchestra_rs::Result<()> {
//! let config = OrchestraConfig::builder().mock_mode(true).build()?;
//! let ctx = AppContext::bootstrap(config)?;
//! let response = ctx.router.run("calculate (2+3)*4").await?;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod context;
pub mod definition;
pub mod error;
pub mod eval;
pub mod memory;
pub mod pipeline;
pub mod report;
pub mod storage;
pub mod tools;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
