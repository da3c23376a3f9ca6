//! Main CLI parser and top-level argument handling.
//!
//! Global options double as configuration: each one falls back to an
//! environment variable (loaded from `.env` by `main`).

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Default OAuth redirect target; the browser lands here after consent.
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8765/oauth/callback";

/// Command-line interface for managing MCP servers and calling their tools.
#[derive(Parser)]
#[command(name = "toolhub")]
#[command(about = "Manage MCP server connections and call their tools")]
#[command(version)]
pub struct Cli {
    /// Database file (defaults to <data dir>/toolhub.db)
    #[arg(long, global = true, env = "TOOLHUB_DATABASE")]
    pub database: Option<PathBuf>,

    /// User the command acts for
    #[arg(long, global = true, env = "TOOLHUB_USER", default_value = "local")]
    pub user: String,

    /// Redirect URI registered with OAuth authorization servers
    #[arg(
        long = "redirect-uri",
        global = true,
        env = "TOOLHUB_OAUTH_REDIRECT_URI",
        default_value = DEFAULT_REDIRECT_URI
    )]
    pub redirect_uri: String,

    /// Per-request timeout for MCP servers, in seconds
    #[arg(
        long = "request-timeout",
        global = true,
        env = "TOOLHUB_REQUEST_TIMEOUT_SECS",
        default_value_t = 60
    )]
    pub request_timeout_secs: u64,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Parse `KEY=VALUE` pairs for `--env` and `--header`.
pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
