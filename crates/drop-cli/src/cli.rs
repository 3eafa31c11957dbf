use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "dropd",
    about = "Drop allocation ledger: one unique item per claimant",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Summarize a campaign's file-backed store
    Inspect(InspectArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Server configuration (TOML)
    #[arg(short, long)]
    pub config: PathBuf,
    /// Override the configured bind address
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Root data directory, as configured in `data_dir`
    #[arg(long)]
    pub data_dir: PathBuf,
    /// Campaign name
    #[arg(long)]
    pub campaign: String,
}
