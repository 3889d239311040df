//! Command line arguments.

use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

/// WebSub hub.
#[derive(Parser, Debug, Default)]
#[command(name = "websub-hub")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "HUB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<IpAddr>,

    /// Port to bind
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log filter directive (overrides HUB_LOG_LEVEL / RUST_LOG)
    #[arg(long)]
    pub log_level: Option<String>,
}
