//! Command-line interface definition using clap.

use clap::{Parser, Subcommand, ValueHint};
use nix::sys::signal::Signal;
use std::path::PathBuf;

/// Daemon harness for the spine fatal signal handlers.
#[derive(Parser, Debug)]
#[command(name = "spine-trap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Stack frames to print on a segmentation fault
    ///
    /// Config: backtrace.frames
    #[arg(long, global = true)]
    pub frames: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the disposition of every monitored signal
    Status {
        /// Install the fatal handlers first
        #[arg(long)]
        install: bool,
    },
    /// Install the fatal handlers and raise a signal
    Raise {
        /// Signal name (SIGINT, INT, int) or number
        #[arg(value_parser = parse_signal)]
        signal: Signal,

        /// Give the signal a foreign handler before installing
        #[arg(long)]
        foreign_handler: bool,

        /// Raise without installing the fatal handlers
        #[arg(long)]
        no_install: bool,
    },
    /// Install the fatal handlers and wait for a fatal signal
    Hold,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create a default configuration file
    Init {
        /// Overwrite existing configuration file
        #[arg(short, long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

/// Parse a signal given by name, with or without the `SIG` prefix, or by number.
pub fn parse_signal(value: &str) -> Result<Signal, String> {
    if let Ok(number) = value.parse::<i32>() {
        return Signal::try_from(number).map_err(|_| format!("unknown signal number: {number}"));
    }

    let upper = value.trim().to_ascii_uppercase();
    let name = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };
    name.parse::<Signal>()
        .map_err(|_| format!("unknown signal: {value}"))
}
