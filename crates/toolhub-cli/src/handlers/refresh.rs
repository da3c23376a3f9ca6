//! Refresh command handler.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::presentation::status_label;

/// Reconnect `id` from its stored configuration and print the new status.
pub async fn execute(ctx: &CliContext, id: &str) -> Result<()> {
    ctx.mcp().refresh_client(id).await?;

    if let Some(client) = ctx.mcp().get_client(id).await? {
        let info = client.info().await;
        println!("{}: {}", info.name, status_label(&info.status));
        if let Some(url) = info.authorization_url {
            println!("Authorize by opening:\n  {url}");
        }
    }
    Ok(())
}
