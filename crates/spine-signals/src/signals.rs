//! The fixed set of signals spine treats as fatal.

use nix::sys::signal::Signal;
use std::fmt;
use std::os::raw::c_int;

/// A signal monitored by the fatal handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FatalSignal {
    Interrupt,
    BrokenPipe,
    SegmentationFault,
    BusError,
    FloatingPointException,
    Quit,
    BadSystemCall,
    Abort,
}

impl FatalSignal {
    /// Every monitored signal, in installation order.
    pub const ALL: [FatalSignal; 8] = [
        FatalSignal::Interrupt,
        FatalSignal::BrokenPipe,
        FatalSignal::SegmentationFault,
        FatalSignal::BusError,
        FatalSignal::FloatingPointException,
        FatalSignal::Quit,
        FatalSignal::BadSystemCall,
        FatalSignal::Abort,
    ];

    pub fn signal(self) -> Signal {
        match self {
            FatalSignal::Interrupt => Signal::SIGINT,
            FatalSignal::BrokenPipe => Signal::SIGPIPE,
            FatalSignal::SegmentationFault => Signal::SIGSEGV,
            FatalSignal::BusError => Signal::SIGBUS,
            FatalSignal::FloatingPointException => Signal::SIGFPE,
            FatalSignal::Quit => Signal::SIGQUIT,
            FatalSignal::BadSystemCall => Signal::SIGSYS,
            FatalSignal::Abort => Signal::SIGABRT,
        }
    }

    pub fn as_raw(self) -> c_int {
        self.signal() as c_int
    }

    /// Look up a raw signal number in the monitored set.
    pub fn from_raw(signum: c_int) -> Option<FatalSignal> {
        FatalSignal::ALL
            .into_iter()
            .find(|sig| sig.as_raw() == signum)
    }

    /// The conventional name, e.g. `SIGINT`.
    pub fn name(self) -> &'static str {
        self.signal().as_str()
    }
}

impl fmt::Display for FatalSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<FatalSignal> for Signal {
    fn from(sig: FatalSignal) -> Signal {
        sig.signal()
    }
}
