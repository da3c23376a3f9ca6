//! Connection test handlers. Nothing is saved.

use anyhow::Result;
use toolhub_core::NewMcpServer;

use crate::bootstrap::CliContext;
use crate::presentation::print_tools;

pub async fn execute(ctx: &CliContext, config: NewMcpServer) -> Result<()> {
    let tools = ctx.mcp().test_connection(config).await?;

    println!("Connection OK, {} tool(s):", tools.len());
    print_tools(&tools);
    Ok(())
}
