#[path = "gpeasy/args.rs"]
mod args;
#[path = "gpeasy/chat.rs"]
mod chat;
#[path = "gpeasy/logging.rs"]
mod logging;
#[path = "gpeasy/proxy.rs"]
mod proxy;

use anyhow::Context;
use clap::Parser;

use gpeasy::AppConfig;

use args::{CliArgs, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    logging::init_logging(args.verbose)?;

    let path = match args.config {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };
    let config =
        AppConfig::load(&path).with_context(|| format!("loading {}", path.display()))?;

    match args.command {
        Command::Proxy {
            port,
            bind,
            log_exchanges,
        } => proxy::run(config, port, bind, log_exchanges).await,
        Command::Chat {
            preset,
            model,
            stream,
        } => chat::run(config, &preset, model.as_deref(), stream).await,
    }
}
