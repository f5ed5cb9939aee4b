//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ForkSink - tee a byte stream into several sinks at once
#[derive(Parser, Debug)]
#[command(
    name = "forksink",
    author,
    version,
    about = "Fan a byte stream out to several sinks",
    long_about = "Reads standard input in chunks and writes every chunk to all sinks of a \n\
                  configured fork. Failing sinks are dropped; the failure policy decides \n\
                  whether a failure also stops the run."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "FORKSINK_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "FORKSINK_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Level used when `RUST_LOG` is not set
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Tee standard input into the configured fork
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "fork.toml", env = "FORKSINK_CONFIG")]
    pub config: PathBuf,

    /// Override the root fork's failure policy
    #[arg(long, value_enum, env = "FORKSINK_POLICY")]
    pub policy: Option<PolicyArg>,

    /// Maximum chunk size in bytes
    #[arg(
        long,
        default_value = "8192",
        value_parser = clap::value_parser!(u64).range(1..),
        env = "FORKSINK_CHUNK_SIZE"
    )]
    pub chunk_size: u64,

    /// Emit one chunk per input line instead of fixed-size chunks
    #[arg(long, conflicts_with = "chunk_size")]
    pub lines: bool,

    /// Override the command queue capacity of every sink
    #[arg(
        long,
        value_parser = clap::value_parser!(u64).range(1..),
        env = "FORKSINK_QUEUE_CAPACITY"
    )]
    pub queue_capacity: Option<u64>,

    /// Keep reading after a failed write instead of stopping
    #[arg(long, env = "FORKSINK_KEEP_GOING")]
    pub keep_going: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "FORKSINK_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "fork.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "fork.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show sink parameters
    #[arg(long)]
    pub params: bool,
}

/// Failure policy as accepted on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyArg {
    /// Report the first target failure to the producer
    Strict,
    /// Drop failing targets silently
    #[value(alias = "ignore-errors")]
    Permissive,
}

impl From<PolicyArg> for contracts::FailurePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Strict => contracts::FailurePolicy::Strict,
            PolicyArg::Permissive => contracts::FailurePolicy::Permissive,
        }
    }
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
