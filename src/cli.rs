use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pingops", version, about = "Continuous multi-target ping monitor")]
pub struct Args {
    /// JSON configuration file
    #[arg(short, long, env = "PINGOPS_CONFIG")]
    pub config: Option<PathBuf>,

    /// File with one address per line, added to the configured targets
    #[arg(short, long)]
    pub targets: Option<PathBuf>,

    /// File with one name per line, matched to --targets by line number
    #[arg(short, long, requires = "targets")]
    pub names: Option<PathBuf>,

    /// Override the control API port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Do not serve the control API
    #[arg(long)]
    pub no_api: bool,

    /// Write the final results here on shutdown (.csv or .json)
    #[arg(short, long)]
    pub export: Option<PathBuf>,
}
