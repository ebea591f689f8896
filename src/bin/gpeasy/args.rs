use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "gpeasy",
    version,
    about = "Persona chat sessions and an observing proxy for OpenAI-compatible APIs"
)]
pub struct CliArgs {
    /// Config file, defaults to ~/.gpeasy/config.toml
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the reverse proxy until Ctrl-C
    Proxy {
        #[arg(long, short = 'p')]
        port: Option<u16>,
        #[arg(long)]
        bind: Option<String>,
        /// Pretty-print every relayed exchange
        #[arg(long)]
        log_exchanges: bool,
    },
    /// Chat with a persona on the terminal
    Chat {
        #[arg(long, default_value = "generic")]
        preset: String,
        #[arg(long, short = 'm')]
        model: Option<String>,
        /// Print replies as they arrive
        #[arg(long)]
        stream: bool,
    },
}
