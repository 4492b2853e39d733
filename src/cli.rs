use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mediasync")]
#[command(about = "Device media sync agent", long_about = None)]
pub struct Cli {
    /// Configuration file (overrides MEDIASYNC_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scheduler and the local API until interrupted
    Run(RunArgs),
    /// Run a single sync and exit
    Sync,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Address to bind the local API to (defaults to server.bind_addr)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}
