use clap::{Parser, Subcommand};
use std::path::PathBuf;

const HELP_EPILOG: &str = r#"Server options can also be provided via environment variables:
  CONFIG_PATH (default: ./config.yaml)
  DB_PATH     (default: config db_path, else data/app.db)
  PORT        (default: config listen_port, else 8000)
  RUST_LOG    (default: info)
"#;

#[derive(Debug, Parser)]
#[command(
    name = "skillloop-server",
    version,
    about = "SkillLoop API server",
    long_about = None,
    after_long_help = HELP_EPILOG,
)]
pub struct Cli {
    /// Optional subcommand. Without one, runs the server.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply pending database migrations and exit
    Migrate {
        /// Database path (defaults to DB_PATH, then data/app.db)
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Load and validate a config file, then exit
    CheckConfig {
        /// Config file to check (defaults to CONFIG_PATH, then ./config.yaml)
        #[arg(long)]
        config_path: Option<PathBuf>,
    },
}
