//! Process exit state written by the fatal handler.
//!
//! There is exactly one [`ExitState`] per process. It is created zeroed
//! before `main` runs and is the only mutable value shared between the
//! signal handler and the rest of the daemon. The handler writes it, and
//! the shutdown path reads it afterwards through [`exit_state()`].
//!
//! Every field is atomic so the handler never takes a lock. Two threads
//! faulting at once may both write; the last writer wins.

use nix::sys::signal::Signal;
use std::os::raw::c_int;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

/// Maximum number of return addresses kept for a backtrace.
pub const FRAME_CAPACITY: usize = 64;

static EXIT_STATE: ExitState = ExitState::new();

/// The process-wide exit state.
pub fn exit_state() -> &'static ExitState {
    &EXIT_STATE
}

/// Exit code and captured stack of the first fatal signal handled.
#[derive(Debug)]
pub struct ExitState {
    exit_code: AtomicI32,
    frame_request: AtomicUsize,
    frame_len: AtomicUsize,
    frames: [AtomicUsize; FRAME_CAPACITY],
}

impl ExitState {
    pub const fn new() -> Self {
        ExitState {
            exit_code: AtomicI32::new(0),
            frame_request: AtomicUsize::new(0),
            frame_len: AtomicUsize::new(0),
            frames: [const { AtomicUsize::new(0) }; FRAME_CAPACITY],
        }
    }

    /// The recorded signal number, or 0 if no fatal signal was handled.
    pub fn exit_code(&self) -> i32 {
        self.exit_code.load(Ordering::Acquire)
    }

    /// The recorded signal, if any.
    pub fn signal(&self) -> Option<Signal> {
        match self.exit_code() {
            0 => None,
            code => Signal::try_from(code).ok(),
        }
    }

    pub(crate) fn record_signal(&self, signum: c_int) {
        self.exit_code.store(signum, Ordering::Release);
    }

    /// Number of frames the handler should capture on a segmentation fault.
    pub fn frame_request(&self) -> usize {
        self.frame_request.load(Ordering::Acquire)
    }

    /// Set the requested frame count, clamped to [`FRAME_CAPACITY`].
    pub fn set_frame_request(&self, frames: usize) {
        self.frame_request
            .store(frames.min(FRAME_CAPACITY), Ordering::Release);
    }

    /// Return addresses from the last capture.
    pub fn frames(&self) -> Vec<usize> {
        let len = self.frame_len.load(Ordering::Acquire).min(FRAME_CAPACITY);
        self.frames[..len]
            .iter()
            .map(|frame| frame.load(Ordering::Relaxed))
            .collect()
    }

    /// Capture up to [`frame_request`](Self::frame_request) return addresses
    /// of the current stack.
    ///
    /// Returns the number of frames actually captured, which may be lower
    /// than the request when the stack is shallower.
    #[cfg(feature = "backtrace")]
    pub fn capture_frames(&self) -> usize {
        let requested = self.frame_request().min(FRAME_CAPACITY);
        let mut len = 0;
        if requested > 0 {
            // SAFETY: the synchronized tracer takes a global lock, which could
            // deadlock inside a signal handler. Concurrent unsynchronized traces
            // only race on the unwinder's caches.
            unsafe {
                backtrace::trace_unsynchronized(|frame| {
                    self.frames[len].store(frame.ip() as usize, Ordering::Relaxed);
                    len += 1;
                    len < requested
                });
            }
        }
        self.frame_len.store(len, Ordering::Release);
        len
    }
}

impl Default for ExitState {
    fn default() -> Self {
        ExitState::new()
    }
}
