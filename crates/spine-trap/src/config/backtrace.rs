//! Backtrace configuration.

use serde::{Deserialize, Serialize};

/// Backtrace configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktraceConfig {
    /// Stack frames printed on a segmentation fault. 0 disables the backtrace;
    /// values above the handler's buffer size are clamped.
    pub frames: usize,
}

impl Default for BacktraceConfig {
    fn default() -> Self {
        BacktraceConfig { frames: 32 }
    }
}
