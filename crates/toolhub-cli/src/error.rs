//! CLI-specific error types and mappings.
//!
//! Maps service errors to exit codes and user-facing messages.

use thiserror::Error;
use toolhub_core::McpServiceError;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// A referenced server does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Invalid input (bad JSON, invalid configuration).
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// The server needs the user to authorize first.
    #[error("{0}")]
    Authorization(String),

    /// Database or token store failure.
    #[error("Database error: {0}")]
    Database(String),

    /// The MCP server could not be reached or failed the call.
    #[error("{0}")]
    Remote(String),

    /// Interrupted by the user.
    #[error("Interrupted")]
    Interrupted,
}

impl CliError {
    /// Map error to an exit code following sysexits.h where one fits.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound(_) => 66,      // EX_NOINPUT
            Self::Arguments(_) => 2,      // EX_USAGE
            Self::Authorization(_) => 77, // EX_NOPERM
            Self::Database(_) => 73,      // EX_CANTCREAT
            Self::Remote(_) => 69,        // EX_UNAVAILABLE
            Self::Interrupted => 130,
        }
    }

    /// Exit code for any handler error; unclassified errors exit with 1.
    pub fn exit_code_for(err: &anyhow::Error) -> i32 {
        if let Some(cli) = err.downcast_ref::<Self>() {
            return cli.exit_code();
        }
        err.downcast_ref::<McpServiceError>()
            .map_or(1, |e| Self::from(e).exit_code())
    }
}

impl From<&McpServiceError> for CliError {
    fn from(err: &McpServiceError) -> Self {
        let message = err.to_string();
        match err {
            McpServiceError::ConfigNotFound(_) | McpServiceError::ServerNotFound(_) => {
                Self::NotFound(message)
            }
            McpServiceError::InvalidConfig(_) | McpServiceError::ToolNotFound { .. } => {
                Self::Arguments(message)
            }
            McpServiceError::AuthorizationRequired { .. } | McpServiceError::OAuth(_) => {
                Self::Authorization(message)
            }
            McpServiceError::Repository(_) | McpServiceError::TokenStore(_) => {
                Self::Database(message)
            }
            McpServiceError::Cancelled => Self::Interrupted,
            McpServiceError::Connection(_)
            | McpServiceError::NotConnected(_)
            | McpServiceError::ToolCall(_)
            | McpServiceError::Internal(_) => Self::Remote(message),
        }
    }
}

impl From<McpServiceError> for CliError {
    fn from(err: McpServiceError) -> Self {
        Self::from(&err)
    }
}
