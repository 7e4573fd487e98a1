//! Command-line interface definitions.

pub mod catalog;
pub mod check;
pub mod output;
pub mod probe;
pub mod run;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stagehand - drive application lifecycles from the command line.
#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register the configured applications and reconcile for each path
    Run(RunArgs),

    /// Validate a configuration file and its application declarations
    Check(ConfigPathArg),

    /// Test a path pattern against a location
    Match(MatchArgs),
}

/// Shared argument for commands that only need a config path.
#[derive(Parser, Debug)]
pub struct ConfigPathArg {
    /// Path to configuration file
    #[arg(short, long, default_value = "stagehand.toml")]
    pub config: PathBuf,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "stagehand.toml")]
    pub config: PathBuf,

    /// Locations to visit, in order (paths like `/settings#tab`)
    #[arg(default_value = "/")]
    pub paths: Vec<String>,

    /// Override log level (debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Use JSON log format instead of pretty
    #[arg(long)]
    pub json_logs: bool,

    /// Print each settled state as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `match` subcommand.
#[derive(Parser, Debug)]
pub struct MatchArgs {
    /// Path pattern, e.g. `/users/:id`
    pub pattern: String,

    /// Location to test: a path or an absolute URL
    pub location: String,

    /// Require the whole route to match instead of a prefix
    #[arg(long)]
    pub exact: bool,
}
