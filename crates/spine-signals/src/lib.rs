//! Fatal signal interception for the spine poller.
//!
//! [`install`] places a handler on SIGINT, SIGPIPE, SIGSEGV, SIGBUS, SIGFPE,
//! SIGQUIT, SIGSYS and SIGABRT, but only where the OS default is still in
//! effect. The handler writes a timestamped `FATAL: Spine ...` line to
//! stderr and records the signal in the process [`ExitState`]. A
//! segmentation fault also prints a backtrace and exits with status 1.
//! [`uninstall`] reverses this for every signal still using the handler.
//!
//! Daemon startup is expected to look like:
//!
//! ```no_run
//! spine_signals::release_runtime_signals();
//! spine_signals::set_date_format("%Y-%m-%d %H:%M:%S");
//! spine_signals::exit_state().set_frame_request(32);
//! spine_signals::install();
//! ```

mod timestamp;

#[cfg(unix)]
mod disposition;
#[cfg(unix)]
mod error;
#[cfg(unix)]
mod exit_state;
#[cfg(unix)]
mod handler;
#[cfg(unix)]
mod signals;

pub use timestamp::*;

#[cfg(unix)]
pub use disposition::{
    Disposition, disposition, dispositions, install, release_runtime_signals, uninstall,
};
#[cfg(unix)]
pub use error::*;
#[cfg(unix)]
pub use exit_state::*;
#[cfg(unix)]
pub use handler::Reason;
#[cfg(unix)]
pub use signals::*;

/// No fatal signals are intercepted on this platform.
#[cfg(not(unix))]
pub fn install() {}

/// No fatal signals are intercepted on this platform.
#[cfg(not(unix))]
pub fn uninstall() {}
