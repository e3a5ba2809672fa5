//! CLI argument parsing with subcommand architecture.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kite", version, about = "Free-tier AI gateway")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the gateway server (default when no subcommand is given)
    Run(RunArgs),
    /// Print the model registry and exit
    Models(ModelsArgs),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to config file
    #[arg(short, long, default_value = "config.yaml", env = "KITE_CONFIG")]
    pub config: String,

    /// Listen host
    #[arg(long, env = "KITE_HOST")]
    pub host: Option<String>,

    /// Listen port
    #[arg(long, env = "KITE_PORT")]
    pub port: Option<u16>,

    /// Log level
    #[arg(long, default_value = "info", env = "KITE_LOG_LEVEL")]
    pub log_level: String,

    /// Graceful shutdown timeout in seconds (overrides config)
    #[arg(long)]
    pub shutdown_timeout: Option<u64>,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            config: std::env::var("KITE_CONFIG").unwrap_or_else(|_| "config.yaml".to_string()),
            host: std::env::var("KITE_HOST").ok(),
            port: std::env::var("KITE_PORT").ok().and_then(|p| p.parse().ok()),
            log_level: std::env::var("KITE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            shutdown_timeout: None,
        }
    }
}

#[derive(Parser, Debug)]
pub struct ModelsArgs {
    /// Path to config file
    #[arg(short, long, default_value = "config.yaml", env = "KITE_CONFIG")]
    pub config: String,
}
