//! spine-trap: installs the spine fatal signal handlers and exercises them.

#[cfg(unix)]
mod cli;
#[cfg(unix)]
mod config;
#[cfg(unix)]
mod daemon;

#[cfg(unix)]
use anyhow::Result;
#[cfg(unix)]
use clap::Parser;
#[cfg(unix)]
use cli::{Cli, Commands, ConfigAction};
#[cfg(unix)]
use config::{Config, init_config, init_config_at, load_config, load_config_from_path};
use std::process::ExitCode;

#[cfg(unix)]
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(not(unix))]
fn main() -> ExitCode {
    eprintln!("Error: spine-trap requires a Unix platform");
    ExitCode::FAILURE
}

#[cfg(unix)]
fn run() -> Result<ExitCode> {
    env_logger::init();

    // The runtime claimed SIGPIPE, SIGSEGV and SIGBUS before main.
    // Hand them back before anything else can install handlers.
    spine_signals::release_runtime_signals();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };
    if let Some(frames) = cli.frames {
        config.backtrace.frames = frames;
    }
    log::debug!("Loaded config: {:?}", config);

    match &cli.command {
        Commands::Config { action } => {
            handle_config_command(action, &cli, &config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status { install } => {
            if *install {
                spine_signals::install();
            }
            print!("{}", daemon::render_status());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Raise {
            signal,
            foreign_handler,
            no_install,
        } => {
            daemon::configure(&config);
            daemon::raise_signal(*signal, *foreign_handler, !*no_install)
        }
        Commands::Hold => {
            daemon::configure(&config);
            daemon::hold()
        }
    }
}

#[cfg(unix)]
fn handle_config_command(action: &ConfigAction, cli: &Cli, config: &Config) -> Result<()> {
    match action {
        ConfigAction::Init { force } => {
            let path = match &cli.config {
                Some(path) => {
                    init_config_at(path, *force)?;
                    path.clone()
                }
                None => init_config(*force)?,
            };
            println!("Configuration file created at: {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            print!("{}", toml::to_string_pretty(config)?);
            println!();
            println!("# date pattern: {}", config.log.date_format());
            Ok(())
        }
    }
}
