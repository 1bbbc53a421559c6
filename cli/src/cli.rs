use clap::Parser;
use std::path::PathBuf;

/// Run a module process behind the peerlink bridge
#[derive(Parser, Debug)]
#[command(name = "peerlink", author, version, about, long_about = None)]
pub struct Args {
    /// Path to the configuration file (defaults to the user config dir)
    #[arg(short, long, env = "PEERLINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// HTML document whose peer scripts are sent at startup
    #[arg(short, long)]
    pub document: Option<PathBuf>,

    /// Base URL for relative source addresses
    #[arg(long)]
    pub base_url: Option<String>,

    /// Scope the document's scripts run in
    #[arg(long)]
    pub scope: Option<String>,

    /// Peer namespace of the bridge commands
    #[arg(long)]
    pub namespace: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Send failures back to the peer instead of reporting them here
    #[arg(long, default_value_t = false)]
    pub forward_errors: bool,

    /// Immediate command to send after bootstrap (repeatable)
    #[arg(long = "send", value_name = "CMD")]
    pub sends: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PEERLINK_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Module command line, after `--`
    #[arg(last = true)]
    pub module: Vec<String>,
}
