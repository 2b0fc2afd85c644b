//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quorum")]
#[command(author, version, about = "Multi-strategy trading decision engine")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the engine against a simulated market
    Paper(PaperArgs),
    /// Validate configuration
    ValidateConfig,
}

#[derive(clap::Args)]
pub struct PaperArgs {
    /// Number of bar intervals to simulate
    #[arg(short, long, default_value = "2000")]
    pub intervals: u32,

    /// Feed seed; identical seeds replay identical runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Starting balance, overriding the configured value
    #[arg(long)]
    pub capital: Option<Decimal>,

    /// Print an engine status line every N intervals
    #[arg(long, default_value = "250")]
    pub report_every: u32,
}
