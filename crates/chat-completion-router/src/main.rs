use anyhow::Result;
use clap::Parser;

mod cli;
mod config_cmds;
mod replay_cmd;
mod route_cmd;

use cli::{Cli, Commands, ConfigCommands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (output to stderr, initialize only once)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let output_format = cli.format.clone();
    let config_path = cli.config;

    match cli.command {
        Commands::Route {
            request,
            emit_body,
            tokenizer,
        } => {
            route_cmd::handle_route(
                config_path.as_deref(),
                request.as_deref(),
                emit_body,
                tokenizer,
                output_format,
            )
            .await?;
        }
        Commands::Tokens { request, tokenizer } => {
            route_cmd::handle_tokens(request.as_deref(), tokenizer, output_format)?;
        }
        Commands::Replay { script } => {
            replay_cmd::handle_replay(config_path.as_deref(), &script, output_format).await?;
        }
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Check => {
                config_cmds::handle_config_check(config_path.as_deref(), output_format)?;
            }
            ConfigCommands::Show => {
                config_cmds::handle_config_show(config_path.as_deref(), output_format)?;
            }
        },
        Commands::Providers => {
            config_cmds::handle_providers(config_path.as_deref(), output_format)?;
        }
    }

    Ok(())
}
