//! Tool call handlers.
//!
//! Ctrl-C cancels the in-flight call; the server is told via
//! `notifications/cancelled`.

use anyhow::Result;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use toolhub_core::McpToolResult;

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Target of a tool call.
pub enum Target<'a> {
    Id(&'a str),
    Name(&'a str),
}

/// Parse `--args`; tool input must be a JSON object.
pub fn parse_input(raw: &str) -> Result<Value, CliError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| CliError::Arguments(format!("--args: {e}")))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(CliError::Arguments("--args must be a JSON object".to_string()))
    }
}

pub async fn execute(
    ctx: &CliContext,
    target: Target<'_>,
    tool: &str,
    raw_args: &str,
) -> Result<()> {
    let input = parse_input(raw_args)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let result = match target {
        Target::Id(id) => {
            ctx.mcp()
                .tool_call_with_cancel(id, tool, input, Some(&cancel))
                .await
        }
        Target::Name(name) => {
            ctx.mcp()
                .tool_call_by_server_name_with_cancel(name, tool, input, Some(&cancel))
                .await
        }
    };
    watcher.abort();

    print_result(&result?)?;
    Ok(())
}

fn print_result(result: &McpToolResult) -> Result<()> {
    let text = result.text();
    if text.is_empty() {
        println!("{}", serde_json::to_string_pretty(&result.content)?);
    } else {
        println!("{text}");
    }

    if let Some(structured) = &result.structured_content {
        println!("{}", serde_json::to_string_pretty(structured)?);
    }

    if result.is_error {
        return Err(CliError::Remote("tool reported an error".to_string()).into());
    }
    Ok(())
}
