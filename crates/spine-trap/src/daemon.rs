//! Daemon lifecycle around the fatal signal handlers.

use crate::config::Config;
use anyhow::{Context, Result};
use nix::sys::signal::{self, SigHandler, Signal};
use spine_signals::{ExitState, dispositions, exit_state};
use std::fmt::Write as _;
use std::io::{self, Write};
use std::os::raw::c_int;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

/// How often `hold` checks the exit state.
const HOLD_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Apply configuration the fatal handler reads at signal time.
pub fn configure(config: &Config) {
    let pattern = config.log.date_format().pattern();
    if !spine_signals::set_date_format(pattern) {
        log::warn!("Log date format was already set; keeping {}", spine_signals::date_format());
    }
    exit_state().set_frame_request(config.backtrace.frames);
    log::debug!(
        "Date format {:?}, {} backtrace frame(s)",
        spine_signals::date_format(),
        exit_state().frame_request()
    );
}

/// Render the disposition table of every monitored signal.
pub fn render_status() -> String {
    let mut out = String::new();
    for (signal, state) in dispositions() {
        let state = match state {
            Ok(disposition) => disposition.to_string(),
            Err(e) => format!("unknown ({})", e),
        };
        let _ = writeln!(out, "{:<8} {:>3}  {}", signal.name(), signal.as_raw(), state);
    }
    out
}

/// Stand-in for a handler installed by another library.
extern "C" fn foreign_handler(_: c_int) {
    let msg = b"foreign handler ran\n";
    unsafe {
        libc::write(libc::STDOUT_FILENO, msg.as_ptr().cast(), msg.len());
    }
}

/// Install the handlers, raise `sig` at ourselves, then shut down.
pub fn raise_signal(sig: Signal, foreign: bool, install: bool) -> Result<ExitCode> {
    if foreign {
        unsafe { signal::signal(sig, SigHandler::Handler(foreign_handler)) }
            .with_context(|| format!("Failed to install foreign handler for {}", sig))?;
    }
    if install {
        spine_signals::install();
    }

    log::info!("Raising {}", sig);
    signal::raise(sig).with_context(|| format!("Failed to raise {}", sig))?;

    spine_signals::uninstall();
    Ok(report_exit(exit_state()))
}

/// Install the handlers and wait until a fatal signal has been handled.
pub fn hold() -> Result<ExitCode> {
    spine_signals::install();

    let state = exit_state();
    {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "ready {}", std::process::id())?;
        stdout.flush()?;
    }

    log::info!("Waiting for a fatal signal");
    while state.exit_code() == 0 {
        thread::sleep(HOLD_POLL_INTERVAL);
    }

    spine_signals::uninstall();
    Ok(report_exit(state))
}

/// Shutdown path: report the exit state and turn it into the process exit code.
pub fn report_exit(state: &ExitState) -> ExitCode {
    let code = state.exit_code();
    match state.signal() {
        Some(sig) => log::info!("Shutting down after {}", sig),
        None => log::debug!("Shutting down without a fatal signal"),
    }
    println!("exit code: {}", code);
    ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX))
}
