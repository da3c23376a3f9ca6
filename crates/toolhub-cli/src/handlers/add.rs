//! Add command handlers.
//!
//! Saving a configuration also (re)connects it, so the printed status is
//! the result of the first connection attempt.

use anyhow::Result;
use toolhub_core::{McpServerStatus, NewMcpServer, Visibility};

use crate::bootstrap::CliContext;
use crate::commands::{HttpArgs, ServerArgs, StdioArgs};
use crate::presentation::{print_tools, status_label};

/// Build the write model for a process server.
pub fn stdio_config(common: &ServerArgs, stdio: &StdioArgs, owner: &str) -> NewMcpServer {
    let mut config = NewMcpServer::new_stdio(
        common.name.clone(),
        stdio.command.clone(),
        stdio.args.clone(),
        owner,
    );
    for (key, value) in &stdio.env {
        config = config.with_env(key.clone(), value.clone());
    }
    if let Some(cwd) = &stdio.cwd {
        config = config.with_working_dir(cwd.clone());
    }
    config.config.path_extra.clone_from(&stdio.path_extra);
    apply_common(config, common)
}

/// Build the write model for an HTTP server.
pub fn http_config(common: &ServerArgs, http: &HttpArgs, owner: &str) -> NewMcpServer {
    let mut config = NewMcpServer::new_http(common.name.clone(), http.url.clone(), owner);
    for (key, value) in &http.headers {
        config = config.with_header(key.clone(), value.clone());
    }
    apply_common(config, common)
}

fn apply_common(mut config: NewMcpServer, common: &ServerArgs) -> NewMcpServer {
    if let Some(id) = &common.id {
        config = config.with_id(id.clone());
    }
    if common.public {
        config = config.with_visibility(Visibility::Public);
    }
    config.with_enabled(!common.disabled)
}

/// Save `config` and report the connection outcome.
pub async fn execute(ctx: &CliContext, config: NewMcpServer) -> Result<()> {
    let client = ctx.mcp().persist_client(config).await?;
    let info = client.info().await;

    println!("Saved MCP server '{}' (id: {})", info.name, info.id);
    println!("Status: {}", status_label(&info.status));

    match info.status {
        McpServerStatus::Connected => {
            println!("Tools ({}):", info.tools.len());
            print_tools(&info.tools);
        }
        McpServerStatus::Authorizing => {
            if let Some(url) = info.authorization_url {
                println!("Open this URL to authorize, then run 'toolhub authorize <state> <code>':");
                println!("  {url}");
            }
        }
        _ => {}
    }
    Ok(())
}
