//! List command handler.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::presentation::print_clients;

/// Connect every enabled server, then print all known clients.
///
/// With `mine`, only servers the current user may see are shown.
pub async fn execute(ctx: &CliContext, mine: bool) -> Result<()> {
    ctx.mcp().initialize().await?;

    let clients = if mine {
        ctx.mcp().get_clients_for_user(ctx.user()).await
    } else {
        ctx.mcp().get_clients().await
    };

    if clients.is_empty() {
        println!("No MCP servers configured.");
        println!("Use 'toolhub add-stdio' or 'toolhub add-http' to add one.");
        return Ok(());
    }

    println!("Found {} MCP server(s):\n", clients.len());
    print_clients(&clients);
    Ok(())
}
