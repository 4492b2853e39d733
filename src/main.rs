mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use mediasync::config::Config;
use mediasync::server;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config)?;

    match cli.command {
        Commands::Run(args) => server::run(config, args.address).await?,
        Commands::Sync => server::sync_once(config).await?,
    }

    Ok(())
}
