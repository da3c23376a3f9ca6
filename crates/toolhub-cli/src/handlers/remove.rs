//! Remove command handler.

use anyhow::Result;

use crate::bootstrap::CliContext;

pub async fn execute(ctx: &CliContext, id: &str) -> Result<()> {
    ctx.mcp().remove_client(id).await?;
    println!("Removed MCP server {id}");
    Ok(())
}
