//! Log timestamp configuration.

use serde::{Deserialize, Serialize};
use spine_signals::{DateFormat, DateOrder};

/// Log configuration.
///
/// Controls the timestamp written in front of fatal diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Order of day, month and year.
    pub date_order: DateOrder,
    /// Character placed between the date fields.
    pub date_separator: char,
}

impl Default for LogConfig {
    fn default() -> Self {
        let format = DateFormat::default();
        LogConfig {
            date_order: format.order,
            date_separator: format.separator,
        }
    }
}

impl LogConfig {
    pub fn date_format(&self) -> DateFormat {
        DateFormat {
            order: self.date_order,
            separator: self.date_separator,
        }
    }
}
