//! CLI entry point - the composition root.
//!
//! This is the ONLY place where infrastructure is wired together via
//! bootstrap. Command dispatch routes to handlers which delegate to
//! `McpService`.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use toolhub_cli::handlers::{self, call::Target};
use toolhub_cli::{Cli, CliConfig, CliContext, CliError, Commands, ServerArgs, bootstrap};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads its env fallbacks
    dotenvy::dotenv().ok();

    let mut cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command.take() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let ctx = bootstrap(CliConfig::from_cli(&cli)).await?;
    let result = dispatch(&ctx, command).await;
    ctx.mcp().shutdown().await;

    if let Err(err) = result {
        eprintln!("Error: {err:#}");
        std::process::exit(CliError::exit_code_for(&err));
    }
    Ok(())
}

/// Logs go to stderr so command output stays pipeable.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(ctx: &CliContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::List { mine } => handlers::list::execute(ctx, mine).await,
        Commands::AddStdio { common, stdio } => {
            let config = handlers::add::stdio_config(&common, &stdio, ctx.user());
            handlers::add::execute(ctx, config).await
        }
        Commands::AddHttp { common, http } => {
            let config = handlers::add::http_config(&common, &http, ctx.user());
            handlers::add::execute(ctx, config).await
        }
        Commands::Remove { id } => handlers::remove::execute(ctx, &id).await,
        Commands::Refresh { id } => handlers::refresh::execute(ctx, &id).await,
        Commands::Tools { id } => handlers::tools::execute(ctx, &id).await,
        Commands::Call { id, tool, args } => {
            handlers::call::execute(ctx, Target::Id(&id), &tool, &args).await
        }
        Commands::CallByName { name, tool, args } => {
            handlers::call::execute(ctx, Target::Name(&name), &tool, &args).await
        }
        Commands::Authorize { state, code } => {
            handlers::authorize::execute(ctx, &state, &code).await
        }
        Commands::TestStdio { stdio } => {
            let config = handlers::add::stdio_config(&throwaway(), &stdio, ctx.user());
            handlers::test_connection::execute(ctx, config).await
        }
        Commands::TestHttp { http } => {
            let config = handlers::add::http_config(&throwaway(), &http, ctx.user());
            handlers::test_connection::execute(ctx, config).await
        }
    }
}

/// Options for a configuration that is never saved.
fn throwaway() -> ServerArgs {
    ServerArgs {
        name: "connection-test".to_string(),
        id: None,
        public: false,
        disabled: false,
    }
}
