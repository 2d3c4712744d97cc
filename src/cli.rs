// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `devsup`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "devsup",
    version,
    about = "Watch a source tree and keep one runner process in sync with it.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Devsup.toml` in the current working directory. The file may
    /// be absent when a runner command is given after `--`.
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DEVSUP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the resolved session, but don't spawn anything.
    #[arg(long)]
    pub dry_run: bool,

    /// How many dependency directories deep a reported dependency may be
    /// and still be watched. `-1` watches all of them.
    #[arg(long, value_name = "N", allow_hyphen_values = true)]
    pub deps: Option<i64>,

    /// Evaluate this code string in the runner instead of a script file.
    #[arg(long, value_name = "CODE")]
    pub eval: Option<String>,

    /// Filename reported to the runner for `--eval` code.
    #[arg(long, value_name = "NAME", default_value = "[eval]")]
    pub eval_filename: String,

    /// Clear the terminal before every restart.
    #[arg(long)]
    pub clear: bool,

    /// Runner command; overrides `[runner].cmd` from the config file.
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
