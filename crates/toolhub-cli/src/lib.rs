//! `toolhub` command-line adapter.
//!
//! [`bootstrap`] is the composition root; [`handlers`] are thin wrappers
//! over `toolhub_mcp::McpService`.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tempfile as _;

// Used by the binary target only
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;

// Re-export primary types for convenient access
pub use bootstrap::{CliConfig, CliContext, LogEmitter, bootstrap};
pub use commands::{Commands, HttpArgs, ServerArgs, StdioArgs};
pub use error::CliError;
pub use parser::Cli;
