//! Command-line surface of the `latelog` binary.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;

/// Run a command, mirroring its output to the terminal and into a log file
/// that is opened only after the command has started.
#[derive(Debug, Parser)]
#[command(name = "latelog", version, about)]
pub struct Cli {
    /// Config file (default: ~/.config/latelog/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file to write captured output to
    #[arg(long, value_name = "PATH")]
    pub log: Option<PathBuf>,

    /// Append to the log file instead of truncating it
    #[arg(long)]
    pub append: bool,

    /// Do not lock the log file
    #[arg(long)]
    pub no_lock: bool,

    /// Leave stdout alone
    #[arg(long)]
    pub no_stdout: bool,

    /// Leave stderr alone
    #[arg(long)]
    pub no_stderr: bool,

    /// Level for latelog's own diagnostics (overridden by RUST_LOG)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to run, followed by its arguments
    #[arg(required = true, trailing_var_arg = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl Cli {
    /// Overlay command-line flags on a loaded config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.log {
            config.log.path = path.clone();
        }
        if self.append {
            config.log.append = true;
        }
        if self.no_lock {
            config.log.lock = false;
        }
        if self.no_stdout {
            config.capture.stdout = false;
        }
        if self.no_stderr {
            config.capture.stderr = false;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }

    /// Program and arguments.
    pub fn program(&self) -> Option<(&str, &[String])> {
        self.command
            .split_first()
            .map(|(program, args)| (program.as_str(), args))
    }
}
