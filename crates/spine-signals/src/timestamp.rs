//! Log timestamp formatting shared with the daemon's logger.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, TimeZone};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

/// Pattern used when the daemon never configured one.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Longest timestamp written in front of a diagnostic, in bytes.
const MAX_TIMESTAMP_LEN: usize = 49;

static DATE_FORMAT: OnceCell<String> = OnceCell::new();

/// Order of the date fields in log timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateOrder {
    /// Month, day, year.
    Mdy,
    /// Day, month, year.
    Dmy,
    /// Year, month, day.
    #[default]
    Ymd,
}

/// The daemon's log date convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateFormat {
    pub order: DateOrder,
    pub separator: char,
}

impl Default for DateFormat {
    fn default() -> Self {
        DateFormat {
            order: DateOrder::Ymd,
            separator: '-',
        }
    }
}

impl DateFormat {
    /// Render as a strftime pattern.
    pub fn pattern(&self) -> String {
        let sep = self.separator;
        // `%` would start a conversion.
        let sep = if sep == '%' {
            "%%".to_string()
        } else {
            sep.to_string()
        };
        let date = match self.order {
            DateOrder::Mdy => format!("%m{sep}%d{sep}%Y"),
            DateOrder::Dmy => format!("%d{sep}%m{sep}%Y"),
            DateOrder::Ymd => format!("%Y{sep}%m{sep}%d"),
        };
        format!("{date} %H:%M:%S")
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern())
    }
}

/// Set the pattern used by the fatal handler.
///
/// Only the first call takes effect, so the handler never observes the
/// pattern changing underneath it. Returns `false` if a pattern was already set.
pub fn set_date_format(pattern: impl Into<String>) -> bool {
    DATE_FORMAT.set(pattern.into()).is_ok()
}

/// The configured pattern, or [`DEFAULT_DATE_FORMAT`].
pub fn date_format() -> &'static str {
    DATE_FORMAT
        .get()
        .map(String::as_str)
        .unwrap_or(DEFAULT_DATE_FORMAT)
}

/// Format `now` with a strftime pattern.
///
/// Never panics: unknown conversions render as `?`, and the result is cut
/// to the log-time buffer length on a character boundary.
pub fn format_timestamp<Tz>(now: &DateTime<Tz>, pattern: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let items = StrftimeItems::new(pattern).map(|item| match item {
        Item::Error => Item::Literal("?"),
        item => item,
    });

    let mut out = String::with_capacity(MAX_TIMESTAMP_LEN + 1);
    let _ = write!(out, "{}", now.format_with_items(items));

    if out.len() > MAX_TIMESTAMP_LEN {
        let mut end = MAX_TIMESTAMP_LEN;
        while !out.is_char_boundary(end) {
            end -= 1;
        }
        out.truncate(end);
    }
    out
}
