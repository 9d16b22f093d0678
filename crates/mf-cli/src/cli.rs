//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Migraflow - versioned database migrations with before/after scripts
#[derive(Parser, Debug)]
#[command(name = "mf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: PathBuf,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the database path
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Database password
    #[arg(long, global = true, env = "MF_DATABASE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run setup, FDW and pending versioned scripts up to the target version
    Migrate(MigrateArgs),

    /// Show the recorded migration version
    Version(VersionArgs),

    /// Record a version as applied and clear the dirty flag
    Force(ForceArgs),

    /// List versioned scripts and whether they are applied
    Status(StatusArgs),
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

/// Arguments for the migrate command
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Target version (overrides migration.version)
    #[arg(short, long)]
    pub target: Option<u32>,

    /// Replay every version when nothing is recorded yet
    #[arg(long)]
    pub start_from_zero: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the version command
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the force command
#[derive(Args, Debug)]
pub struct ForceArgs {
    /// Version to record
    pub version: u32,
}

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}
