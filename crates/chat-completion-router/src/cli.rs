use std::path::PathBuf;

use ccr_core::OutputFormat;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "ccr")]
#[command(about = "Chat-completion router: pick an upstream model for each request")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (.toml, or .json); defaults to the user config directory
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, default_value = "text", global = true)]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Route one request and print the decision
    Route {
        /// Request JSON file; reads from stdin if omitted or "-"
        request: Option<PathBuf>,

        /// Also print the body that would be forwarded upstream
        #[arg(long)]
        emit_body: bool,

        #[arg(long, value_enum, default_value = "tiktoken")]
        tokenizer: Tokenizer,
    },

    /// Count the tokens routing would see for a request
    Tokens {
        /// Request JSON file; reads from stdin if omitted or "-"
        request: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "tiktoken")]
        tokenizer: Tokenizer,
    },

    /// Replay a JSON-lines script of failover operations against one router
    Replay {
        /// Script file, one operation per line ("-" for stdin)
        script: PathBuf,
    },

    /// Show/validate configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },

    /// List configured providers and their models
    Providers,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate the configuration file
    Check,
    /// Show the effective configuration (API keys redacted)
    Show,
}

/// Tokenizer used to size requests
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Tokenizer {
    /// cl100k_base BPE
    Tiktoken,
    /// One token per four characters
    Estimate,
}
