//! Command handlers that delegate to the MCP service.
//!
//! Handlers follow the canonical pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`
//! - Thin wrappers that parse CLI input, call `McpService`, print results
//!
//! Handlers should NOT access repositories directly or hold business logic.

pub mod add;
pub mod authorize;
pub mod call;
pub mod list;
pub mod refresh;
pub mod remove;
pub mod test_connection;
pub mod tools;
