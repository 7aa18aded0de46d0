//! Installing and removing the fatal handler.
//!
//! A monitored signal is only ever moved between two states: the OS default
//! and the fatal handler. A disposition set by anyone else (a threading or
//! SNMP library, the embedding application) is never replaced.
//!
//! Each change is made twice, once through `sigaction` and once through
//! `signal`, so both delivery mechanisms a platform may use end up in the
//! same state.

use crate::error::{TrapError, TrapResult};
use crate::handler::fatal_handler;
use crate::signals::FatalSignal;
use nix::errno::Errno;
use nix::sys::signal::SigSet;
use std::fmt;
use std::os::raw::c_int;
use std::{mem, ptr};

/// Current disposition of a monitored signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The OS default action.
    Default,
    /// The spine fatal handler.
    Fatal,
    /// Ignored, or handled by another component.
    Other,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Default => f.write_str("default"),
            Disposition::Fatal => f.write_str("fatal handler"),
            Disposition::Other => f.write_str("other"),
        }
    }
}

/// The two dispositions this module is allowed to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handler {
    Default,
    Fatal,
}

impl Handler {
    fn raw(self) -> libc::sighandler_t {
        match self {
            Handler::Default => libc::SIG_DFL,
            Handler::Fatal => fatal_handler as extern "C" fn(c_int) as libc::sighandler_t,
        }
    }

    fn disposition(self) -> Disposition {
        match self {
            Handler::Default => Disposition::Default,
            Handler::Fatal => Disposition::Fatal,
        }
    }
}

/// Mechanism used to change a disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Sigaction,
    Signal,
}

const BACKENDS: [Backend; 2] = [Backend::Sigaction, Backend::Signal];

/// Query the disposition of a monitored signal.
pub fn disposition(signal: FatalSignal) -> TrapResult<Disposition> {
    query(signal).map(|action| classify(&action))
}

/// Query every monitored signal, in table order.
pub fn dispositions() -> Vec<(FatalSignal, TrapResult<Disposition>)> {
    FatalSignal::ALL
        .into_iter()
        .map(|signal| (signal, disposition(signal)))
        .collect()
}

/// Install the fatal handler on every monitored signal still at its default.
///
/// Signals handled or ignored by another component are left alone, and a
/// signal whose disposition cannot be read is skipped. Calling this again
/// changes nothing.
pub fn install() {
    for backend in BACKENDS {
        for signal in FatalSignal::ALL {
            match swap(backend, signal, Handler::Default, Handler::Fatal) {
                Ok(true) => log::debug!("Installed fatal handler for {} ({:?})", signal, backend),
                Ok(false) => log::trace!("Left {} untouched ({:?})", signal, backend),
                Err(e) => log::debug!("Skipping {}: {}", signal, e),
            }
        }
    }
}

/// Restore the default action on every monitored signal still using the
/// fatal handler.
///
/// Safe to call without a prior [`install`]; handlers installed by other
/// components in the meantime are kept.
pub fn uninstall() {
    for backend in BACKENDS {
        for signal in FatalSignal::ALL {
            match swap(backend, signal, Handler::Fatal, Handler::Default) {
                Ok(true) => log::debug!("Removed fatal handler from {} ({:?})", signal, backend),
                Ok(false) => log::trace!("Left {} untouched ({:?})", signal, backend),
                Err(e) => log::debug!("Skipping {}: {}", signal, e),
            }
        }
    }
}

/// Hand signals claimed by the Rust runtime back to the OS default.
///
/// Before `main`, the runtime ignores SIGPIPE and installs stack overflow
/// handlers (`SA_SIGINFO | SA_ONSTACK`) for SIGSEGV and SIGBUS. Left in
/// place, [`install`] would treat them as foreign and never catch those
/// signals. Call this once at startup, before any other component installs
/// its own handlers. Nothing else is touched.
pub fn release_runtime_signals() {
    let claimed = [
        FatalSignal::BrokenPipe,
        FatalSignal::SegmentationFault,
        FatalSignal::BusError,
    ];
    for signal in claimed {
        let current = match query(signal) {
            Ok(action) => action,
            Err(e) => {
                log::debug!("Skipping {}: {}", signal, e);
                continue;
            }
        };
        if !is_runtime_claimed(signal, &current) {
            continue;
        }

        let mut action = current;
        action.sa_sigaction = libc::SIG_DFL;
        action.sa_flags = 0;
        action.sa_mask = *SigSet::empty().as_ref();
        match update(signal, &action) {
            Ok(()) => log::debug!("Released {} from the runtime", signal),
            Err(e) => log::debug!("Could not release {}: {}", signal, e),
        }
    }
}

fn is_runtime_claimed(signal: FatalSignal, action: &libc::sigaction) -> bool {
    let guard_flags = libc::SA_SIGINFO | libc::SA_ONSTACK;
    match signal {
        FatalSignal::BrokenPipe => action.sa_sigaction == libc::SIG_IGN,
        FatalSignal::SegmentationFault | FatalSignal::BusError => {
            action.sa_sigaction != libc::SIG_DFL
                && action.sa_sigaction != libc::SIG_IGN
                && action.sa_flags & guard_flags == guard_flags
        }
        _ => false,
    }
}

/// Move `signal` from `expected` to `replacement` through `backend`.
///
/// Returns whether the disposition was changed.
fn swap(
    backend: Backend,
    signal: FatalSignal,
    expected: Handler,
    replacement: Handler,
) -> TrapResult<bool> {
    let current = query(signal)?;

    match backend {
        Backend::Sigaction => {
            if classify(&current) != expected.disposition() {
                return Ok(false);
            }

            let mut action = current;
            action.sa_sigaction = replacement.raw();
            if replacement == Handler::Fatal {
                action.sa_mask = *SigSet::empty().as_ref();
                action.sa_flags = libc::SA_RESTART;
            }
            update(signal, &action)?;
            Ok(true)
        }
        Backend::Signal => {
            let previous = unsafe { libc::signal(signal.as_raw(), replacement.raw()) };
            if previous == libc::SIG_ERR {
                return Err(TrapError::Update {
                    signal: signal.signal(),
                    source: Errno::last(),
                });
            }
            if previous == expected.raw() && classify(&current) == expected.disposition() {
                return Ok(true);
            }

            // `signal` cannot express SA_SIGINFO or a mask; put back the
            // full action it replaced.
            update(signal, &current)?;
            Ok(false)
        }
    }
}

fn classify(action: &libc::sigaction) -> Disposition {
    if action.sa_sigaction == libc::SIG_DFL {
        Disposition::Default
    } else if action.sa_sigaction == Handler::Fatal.raw() && action.sa_flags & libc::SA_SIGINFO == 0
    {
        Disposition::Fatal
    } else {
        Disposition::Other
    }
}

fn query(signal: FatalSignal) -> TrapResult<libc::sigaction> {
    let mut current: libc::sigaction = unsafe { mem::zeroed() };
    let rc = unsafe { libc::sigaction(signal.as_raw(), ptr::null(), &mut current) };
    Errno::result(rc).map_err(|source| TrapError::Query {
        signal: signal.signal(),
        source,
    })?;
    Ok(current)
}

fn update(signal: FatalSignal, action: &libc::sigaction) -> TrapResult<()> {
    let rc = unsafe { libc::sigaction(signal.as_raw(), action, ptr::null_mut()) };
    Errno::result(rc).map(drop).map_err(|source| TrapError::Update {
        signal: signal.signal(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_state::exit_state;
    use nix::sys::signal::{Signal, raise};
    use serial_test::serial;
    use std::ffi::c_void;
    use std::sync::atomic::{AtomicI32, Ordering};

    static FOREIGN_CALLS: AtomicI32 = AtomicI32::new(0);

    extern "C" fn foreign_handler(_: c_int) {
        FOREIGN_CALLS.fetch_add(1, Ordering::SeqCst);
    }

    extern "C" fn foreign_siginfo_handler(_: c_int, _: *mut libc::siginfo_t, _: *mut c_void) {}

    fn set_action(signal: FatalSignal, handler: libc::sighandler_t, flags: c_int, mask: &[c_int]) {
        let mut action: libc::sigaction = unsafe { mem::zeroed() };
        action.sa_sigaction = handler;
        action.sa_flags = flags;
        unsafe {
            libc::sigemptyset(&mut action.sa_mask);
            for &sig in mask {
                libc::sigaddset(&mut action.sa_mask, sig);
            }
        }
        update(signal, &action).unwrap();
    }

    /// Put every monitored signal back to the OS default.
    ///
    /// The test harness starts with SIGPIPE ignored and stack overflow
    /// handlers on SIGSEGV and SIGBUS, so every test begins from here.
    fn reset_all() {
        for signal in FatalSignal::ALL {
            set_action(signal, libc::SIG_DFL, 0, &[]);
        }
    }

    fn foreign() -> libc::sighandler_t {
        foreign_handler as extern "C" fn(c_int) as libc::sighandler_t
    }

    #[test]
    #[serial]
    fn test_install_takes_every_default_signal() {
        reset_all();
        install();
        for (signal, state) in dispositions() {
            assert_eq!(state.unwrap(), Disposition::Fatal, "{signal}");
        }
        reset_all();
    }

    #[test]
    #[serial]
    fn test_install_leaves_foreign_and_ignored_signals() {
        reset_all();
        set_action(FatalSignal::Quit, libc::SIG_IGN, 0, &[]);
        set_action(FatalSignal::BrokenPipe, foreign(), libc::SA_RESTART, &[]);

        install();

        assert_eq!(query(FatalSignal::Quit).unwrap().sa_sigaction, libc::SIG_IGN);
        assert_eq!(query(FatalSignal::BrokenPipe).unwrap().sa_sigaction, foreign());
        for signal in FatalSignal::ALL {
            let expected = match signal {
                FatalSignal::Quit | FatalSignal::BrokenPipe => Disposition::Other,
                _ => Disposition::Fatal,
            };
            assert_eq!(disposition(signal).unwrap(), expected, "{signal}");
        }
        reset_all();
    }

    #[test]
    #[serial]
    fn test_install_keeps_siginfo_handler_intact() {
        reset_all();
        let handler = foreign_siginfo_handler
            as extern "C" fn(c_int, *mut libc::siginfo_t, *mut c_void)
            as libc::sighandler_t;
        set_action(
            FatalSignal::BrokenPipe,
            handler,
            libc::SA_SIGINFO,
            &[libc::SIGUSR1],
        );

        install();
        uninstall();

        let action = query(FatalSignal::BrokenPipe).unwrap();
        assert_eq!(action.sa_sigaction, handler);
        assert_ne!(action.sa_flags & libc::SA_SIGINFO, 0);
        assert_eq!(unsafe { libc::sigismember(&action.sa_mask, libc::SIGUSR1) }, 1);
        reset_all();
    }

    #[test]
    #[serial]
    fn test_installed_action_uses_restart_and_empty_mask() {
        reset_all();
        install();
        for signal in FatalSignal::ALL {
            let action = query(signal).unwrap();
            assert_ne!(action.sa_flags & libc::SA_RESTART, 0, "{signal}");
            assert_eq!(action.sa_flags & libc::SA_SIGINFO, 0, "{signal}");
            for other in FatalSignal::ALL {
                assert_eq!(
                    unsafe { libc::sigismember(&action.sa_mask, other.as_raw()) },
                    0,
                    "{signal} should not block {other}"
                );
            }
        }
        reset_all();
    }

    #[test]
    #[serial]
    fn test_install_twice_matches_once() {
        reset_all();
        install();
        let once: Vec<_> = FatalSignal::ALL
            .iter()
            .map(|&s| {
                let a = query(s).unwrap();
                (a.sa_sigaction, a.sa_flags)
            })
            .collect();
        install();
        let twice: Vec<_> = FatalSignal::ALL
            .iter()
            .map(|&s| {
                let a = query(s).unwrap();
                (a.sa_sigaction, a.sa_flags)
            })
            .collect();
        assert_eq!(once, twice);
        reset_all();
    }

    #[test]
    #[serial]
    fn test_uninstall_restores_default() {
        reset_all();
        install();
        uninstall();
        for (signal, state) in dispositions() {
            assert_eq!(state.unwrap(), Disposition::Default, "{signal}");
        }
    }

    #[test]
    #[serial]
    fn test_uninstall_without_install_changes_nothing() {
        reset_all();
        set_action(FatalSignal::Interrupt, foreign(), 0, &[]);
        uninstall();
        for signal in FatalSignal::ALL {
            let expected = if signal == FatalSignal::Interrupt {
                Disposition::Other
            } else {
                Disposition::Default
            };
            assert_eq!(disposition(signal).unwrap(), expected, "{signal}");
        }
        reset_all();
    }

    #[test]
    #[serial]
    fn test_uninstall_keeps_handler_that_took_over() {
        reset_all();
        install();
        set_action(FatalSignal::Quit, foreign(), 0, &[]);
        uninstall();
        assert_eq!(query(FatalSignal::Quit).unwrap().sa_sigaction, foreign());
        assert_eq!(disposition(FatalSignal::Interrupt).unwrap(), Disposition::Default);
        reset_all();
    }

    #[test]
    #[serial]
    fn test_unmonitored_signal_is_not_touched() {
        reset_all();
        let mut before: libc::sigaction = unsafe { mem::zeroed() };
        unsafe { libc::sigaction(libc::SIGUSR2, ptr::null(), &mut before) };
        install();
        let mut after: libc::sigaction = unsafe { mem::zeroed() };
        unsafe { libc::sigaction(libc::SIGUSR2, ptr::null(), &mut after) };
        assert_eq!(before.sa_sigaction, after.sa_sigaction);
        reset_all();
    }

    #[test]
    #[serial]
    fn test_sigint_records_exit_code_and_resets_disposition() {
        reset_all();
        install();
        raise(Signal::SIGINT).unwrap();
        assert_eq!(exit_state().exit_code(), libc::SIGINT);
        assert_eq!(exit_state().signal(), Some(Signal::SIGINT));
        // The handler put SIGINT back to default; the rest stay installed.
        assert_eq!(disposition(FatalSignal::Interrupt).unwrap(), Disposition::Default);
        assert_eq!(disposition(FatalSignal::Quit).unwrap(), Disposition::Fatal);
        reset_all();
    }

    #[test]
    #[serial]
    fn test_third_party_pipe_handler_still_runs() {
        reset_all();
        set_action(FatalSignal::BrokenPipe, foreign(), 0, &[]);
        install();

        let code_before = exit_state().exit_code();
        let calls_before = FOREIGN_CALLS.load(Ordering::SeqCst);
        raise(Signal::SIGPIPE).unwrap();

        assert_eq!(FOREIGN_CALLS.load(Ordering::SeqCst), calls_before + 1);
        assert_eq!(exit_state().exit_code(), code_before);
        reset_all();
    }

    #[test]
    #[serial]
    fn test_release_runtime_signals_only_frees_runtime_claims() {
        reset_all();
        let guard = foreign_siginfo_handler
            as extern "C" fn(c_int, *mut libc::siginfo_t, *mut c_void)
            as libc::sighandler_t;
        set_action(FatalSignal::BrokenPipe, libc::SIG_IGN, 0, &[]);
        set_action(
            FatalSignal::SegmentationFault,
            guard,
            libc::SA_SIGINFO | libc::SA_ONSTACK,
            &[],
        );
        set_action(FatalSignal::BusError, foreign(), 0, &[]);
        set_action(FatalSignal::Quit, libc::SIG_IGN, 0, &[]);

        release_runtime_signals();

        assert_eq!(disposition(FatalSignal::BrokenPipe).unwrap(), Disposition::Default);
        assert_eq!(
            disposition(FatalSignal::SegmentationFault).unwrap(),
            Disposition::Default
        );
        assert_eq!(disposition(FatalSignal::BusError).unwrap(), Disposition::Other);
        assert_eq!(disposition(FatalSignal::Quit).unwrap(), Disposition::Other);
        reset_all();
    }

    #[test]
    fn test_disposition_display() {
        assert_eq!(Disposition::Default.to_string(), "default");
        assert_eq!(Disposition::Fatal.to_string(), "fatal handler");
        assert_eq!(Disposition::Other.to_string(), "other");
    }
}
