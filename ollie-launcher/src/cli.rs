use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about = "Natural-language command server")]
pub struct Cli {
    /// Overrides `server.port`
    #[arg(long)]
    pub port: Option<u16>,
    /// Overrides `server.host`
    #[arg(long)]
    pub host: Option<String>,
    /// TOML settings file, applied on top of ./ollie.toml
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// tracing filter directive, e.g. `debug` or `backend=trace`
    #[arg(long)]
    pub log_level: Option<String>,
}
