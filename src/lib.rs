//! # agentcore
//!
//! An agentic execution core: an LLM-driven tool-calling loop with loop
//! detection, supervised checkpoints, and resilient primary/fallback
//! dispatch.
//!
//! ## Architecture
//!
//! - **Agent** (`agent`): the tool-calling loop itself (`agent::run::Agent`),
//!   its supporting components (parser, loop detector, checkpoint arbiter,
//!   model-tier selector, prompt composer, quality gate, health prober,
//!   recovery analyzer), and the `agent::resilient::ResilientDispatcher`
//!   that wraps a run with primary/fallback resilience.
//! - **Tools** (`tools`): the fixed tool catalog the loop can invoke
//!   (filesystem, shell, web search, external memory).
//! - **Configuration** (`config`): environment/file-driven settings for
//!   credentials, step limits, and fallback provider ordering.
//! - **Errors** (`error`): the crate's `Error`/`Result` and the `ErrorKind`
//!   classifier the Recovery Analyzer consumes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agentcore::config::AgentSettings;
//! use agentcore::Result;
//!
//! fn main() -> Result<()> {
//!     let settings = AgentSettings::load()?;
//!     println!("default model: {}", settings.default_model);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod tools;

pub use error::{Error, Result};

/// Crate version, from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name, from `Cargo.toml`.
pub const NAME: &str = env!("CARGO_PKG_NAME");
