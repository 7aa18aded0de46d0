//! The fatal signal handler.
//!
//! When a monitored signal arrives the handler:
//! 1. Resets the signal to its default action (a second delivery is not caught again)
//! 2. Records the signal number in the [`ExitState`]
//! 3. Writes a timestamped diagnostic to stderr
//! 4. On a segmentation fault, prints a backtrace and exits with status 1
//!
//! Every other signal returns after logging and leaves the outcome to the
//! now-default disposition.
//!
//! Formatted output, the timestamp allocation and symbol lookup are not
//! async-signal-safe. A fault raised while the handler itself is running is
//! not guarded against.

use crate::exit_state::{ExitState, exit_state};
use crate::timestamp::{date_format, format_timestamp};
use chrono::Local;
use std::fmt;
use std::io::{self, Write};
use std::os::raw::c_int;

/// Why spine is going down, as printed after `FATAL: Spine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Abort,
    ConsoleOperator,
    SegmentationFault,
    BusError,
    FloatingPointException,
    KeyboardQuit,
    BrokenPipe,
    Unhandled(c_int),
}

impl Reason {
    pub fn of(signum: c_int) -> Reason {
        match signum {
            libc::SIGABRT => Reason::Abort,
            libc::SIGINT => Reason::ConsoleOperator,
            libc::SIGSEGV => Reason::SegmentationFault,
            libc::SIGBUS => Reason::BusError,
            libc::SIGFPE => Reason::FloatingPointException,
            libc::SIGQUIT => Reason::KeyboardQuit,
            libc::SIGPIPE => Reason::BrokenPipe,
            other => Reason::Unhandled(other),
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Abort => f.write_str("Interrupted by Abort Signal"),
            Reason::ConsoleOperator => f.write_str("Interrupted by Console Operator"),
            Reason::SegmentationFault => f.write_str("Encountered a Segmentation Fault"),
            Reason::BusError => f.write_str("Encountered a Bus Error"),
            Reason::FloatingPointException => {
                f.write_str("Encountered a Floating Point Exception")
            }
            Reason::KeyboardQuit => f.write_str("Encountered a Keyboard Quit Command"),
            Reason::BrokenPipe => f.write_str("Encountered a Broken Pipe"),
            Reason::Unhandled(signum) => write!(
                f,
                "Encountered An Unhandled Exception Signal Number: '{signum}'"
            ),
        }
    }
}

/// Signal handler installed for every monitored signal.
pub(crate) extern "C" fn fatal_handler(signum: c_int) {
    // Prevent infinite loop by resetting to default handler
    unsafe {
        libc::signal(signum, libc::SIG_DFL);
    }

    let state = exit_state();
    state.record_signal(signum);

    let logtime = format_timestamp(&Local::now(), date_format());

    if report(&mut io::stderr(), &logtime, signum, state) {
        std::process::exit(1);
    }
}

/// Write the diagnostic for `signum`.
///
/// Returns `true` when the process has to terminate right away.
fn report(out: &mut impl Write, logtime: &str, signum: c_int, state: &ExitState) -> bool {
    let reason = Reason::of(signum);
    let _ = writeln!(out, "{logtime} FATAL: Spine {reason}");

    if reason != Reason::SegmentationFault {
        return false;
    }

    #[cfg(feature = "backtrace")]
    write_backtrace(out, state);
    #[cfg(not(feature = "backtrace"))]
    let _ = state;

    let _ = out.flush();
    true
}

#[cfg(feature = "backtrace")]
fn write_backtrace(out: &mut impl Write, state: &ExitState) {
    let requested = state.frame_request();
    let _ = writeln!(out, "Generating backtrace...{requested} line(s)...");
    if requested == 0 {
        return;
    }

    state.capture_frames();
    for (row, ip) in state.frames().into_iter().enumerate() {
        let _ = writeln!(out, "{row:3}: {}", describe_frame(ip));
    }
}

/// Resolve a return address to `symbol [address]`, or just `[address]`
/// when no symbol is available (stripped or static binaries).
#[cfg(feature = "backtrace")]
fn describe_frame(ip: usize) -> String {
    let mut name = None;
    // SAFETY: see `ExitState::capture_frames`; the synchronized resolver
    // shares the tracer's lock.
    unsafe {
        backtrace::resolve_unsynchronized(ip as *mut std::ffi::c_void, |symbol| {
            if name.is_none() {
                name = symbol.name().map(|n| n.to_string());
            }
        });
    }

    match name {
        Some(name) => format!("{name} [{ip:#x}]"),
        None => format!("[{ip:#x}]"),
    }
}
