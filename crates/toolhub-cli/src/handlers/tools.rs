//! Tools command handler.

use anyhow::Result;
use toolhub_core::McpServiceError;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{print_tools, status_label};

pub async fn execute(ctx: &CliContext, id: &str) -> Result<()> {
    let client = ctx
        .mcp()
        .get_client(id)
        .await?
        .ok_or_else(|| McpServiceError::ConfigNotFound(id.to_string()))?;

    let status = client.status().await;
    if !status.is_connected() {
        return Err(CliError::Remote(format!(
            "{} is {}",
            client.name(),
            status_label(&status)
        ))
        .into());
    }

    let tools = client.tools().await;
    println!("{} tool(s) on {}:", tools.len(), client.name());
    print_tools(&tools);
    Ok(())
}
