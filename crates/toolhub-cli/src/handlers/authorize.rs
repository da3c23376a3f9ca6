//! Authorize command handler.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::presentation::{print_tools, status_label};

/// Complete an OAuth redirect and reconnect the server it belongs to.
pub async fn execute(ctx: &CliContext, state: &str, code: &str) -> Result<()> {
    let client = ctx.mcp().complete_authorization(state, code).await?;
    let info = client.info().await;

    println!("Authorized '{}': {}", info.name, status_label(&info.status));
    print_tools(&info.tools);
    Ok(())
}
