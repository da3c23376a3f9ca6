//! Table formatting utilities for CLI output.

use toolhub_core::{McpServerStatus, McpTool};
use toolhub_mcp::McpClientInfo;

/// Truncates a string to a maximum number of characters, adding "..." if needed.
///
/// # Examples
///
/// ```rust
/// use toolhub_cli::presentation::truncate_string;
///
/// assert_eq!(truncate_string("Hello", 10), "Hello");
/// assert_eq!(truncate_string("Hello World", 8), "Hello...");
/// ```
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Print a horizontal separator line.
pub fn print_separator(width: usize) {
    println!("{}", "-".repeat(width));
}

/// Short status text; errors carry their message.
pub fn status_label(status: &McpServerStatus) -> String {
    match status {
        McpServerStatus::Error(message) => format!("error: {message}"),
        other => other.label().to_string(),
    }
}

/// Print one row per client, followed by pending authorization links.
pub fn print_clients(clients: &[McpClientInfo]) {
    println!(
        "{:<38} {:<20} {:<6} {:<8} {:<6} Status",
        "ID", "Name", "Type", "Access", "Tools"
    );
    print_separator(100);

    for client in clients {
        println!(
            "{:<38} {:<20} {:<6} {:<8} {:<6} {}",
            truncate_string(&client.id, 37),
            truncate_string(&client.name, 19),
            client.server_type.as_str(),
            client.visibility.as_str(),
            client.tools.len(),
            truncate_string(&status_label(&client.status), 60),
        );
    }

    for client in clients {
        if let Some(url) = &client.authorization_url {
            println!();
            println!("Authorize '{}' by opening:\n  {url}", client.name);
        }
    }
}

/// Print tool names with their descriptions.
pub fn print_tools(tools: &[McpTool]) {
    for tool in tools {
        match &tool.description {
            Some(desc) => println!("  {:<30} {}", tool.name, truncate_string(desc, 70)),
            None => println!("  {}", tool.name),
        }
    }
}
