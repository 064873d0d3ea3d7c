use clap::Parser;
use std::path::PathBuf;

const HELP_EPILOG: &str = r#"Server options can also be provided via environment variables:
  CONFIG_PATH (default: ./config.yaml)
  DB_PATH     (default: data/archer-health.db)
  PORT        (default: 5150 or config.listen_port)
"#;

#[derive(Debug, Parser)]
#[command(
    name = "archer-health-server",
    version,
    about = "Archer Health API server",
    long_about = None,
    after_long_help = HELP_EPILOG,
)]
pub struct Cli {
    /// Path to the YAML config file (takes precedence over CONFIG_PATH)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Listen port (takes precedence over PORT and config.listen_port)
    #[arg(long)]
    pub port: Option<u16>,
}
