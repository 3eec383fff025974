//! Status code classification.
//!
//! Two independent mappings from a numeric status: a coarse human label used in
//! the log message, and the severity the record is emitted at. A status of `0`
//! means no response head was ever produced for the request.

use tracing::Level;

/// Returns the coarse label for a status code.
///
/// ```rust
/// use httplog::status::status_label;
///
/// assert_eq!(status_label(204), "OK");
/// assert_eq!(status_label(404), "Client Error");
/// assert_eq!(status_label(0), "Unknown");
/// ```
pub fn status_label(status: u16) -> &'static str {
    match status {
        100..=299 => "OK",
        300..=399 => "Redirect",
        400..=499 => "Client Error",
        500..=u16::MAX => "Server Error",
        _ => "Unknown",
    }
}

/// Returns the severity a response with this status is logged at.
///
/// A missing status is treated as anomalous and logged at `WARN`, even though
/// its label is only "Unknown".
pub fn status_level(status: u16) -> Level {
    match status {
        0 => Level::WARN,
        1..=399 => Level::INFO,
        400..=499 => Level::WARN,
        500..=u16::MAX => Level::ERROR,
    }
}
