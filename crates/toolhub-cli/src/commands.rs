//! Subcommands of the `toolhub` binary.

use clap::{Args, Subcommand};

use crate::parser::parse_key_value;

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Connect every enabled server and show its status
    List {
        /// Only servers visible to the current user
        #[arg(long)]
        mine: bool,
    },

    /// Add (or replace) a server that runs as a local process
    AddStdio {
        #[command(flatten)]
        common: ServerArgs,
        #[command(flatten)]
        stdio: StdioArgs,
    },

    /// Add (or replace) a server reached over streamable HTTP
    AddHttp {
        #[command(flatten)]
        common: ServerArgs,
        #[command(flatten)]
        http: HttpArgs,
    },

    /// Delete a server configuration and its stored tokens
    Remove {
        /// Server id
        id: String,
    },

    /// Reconnect a server from its stored configuration
    Refresh {
        /// Server id
        id: String,
    },

    /// List the tools a server advertises
    Tools {
        /// Server id
        id: String,
    },

    /// Call a tool on a server by id
    Call {
        /// Server id
        id: String,
        /// Tool name
        tool: String,
        /// Tool input as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },

    /// Call a tool on a server by name
    CallByName {
        /// Server name
        name: String,
        /// Tool name
        tool: String,
        /// Tool input as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },

    /// Finish an OAuth authorization with the redirect's state and code
    Authorize {
        /// `state` query parameter from the redirect
        state: String,
        /// `code` query parameter from the redirect
        code: String,
    },

    /// Try a process server without saving it
    TestStdio {
        #[command(flatten)]
        stdio: StdioArgs,
    },

    /// Try an HTTP server without saving it
    TestHttp {
        #[command(flatten)]
        http: HttpArgs,
    },
}

/// Options shared by the `add-*` commands.
#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Unique server name
    pub name: String,

    /// Replace the server with this id instead of adding a new one
    #[arg(long)]
    pub id: Option<String>,

    /// Let every user see this server
    #[arg(long)]
    pub public: bool,

    /// Store the server without connecting it at startup
    #[arg(long)]
    pub disabled: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StdioArgs {
    /// Executable to run (name or absolute path)
    pub command: String,

    /// Arguments passed to the executable
    #[arg(last = true)]
    pub args: Vec<String>,

    /// Environment variable for the process (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Working directory (absolute)
    #[arg(long)]
    pub cwd: Option<String>,

    /// Directories searched before PATH
    #[arg(long = "path-extra")]
    pub path_extra: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct HttpArgs {
    /// Endpoint URL
    pub url: String,

    /// Extra request header (repeatable)
    #[arg(long = "header", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub headers: Vec<(String, String)>,
}
