//! Error types for data parsing in homecast-types.

use thiserror::Error;

/// Errors that can occur when parsing device-reported data.
///
/// This error type is platform-agnostic and does not include
/// HTTP-specific errors (those belong in homecast-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// The device reported an alarm status code outside the known range.
    ///
    /// Unknown codes reject the record rather than defaulting, so that
    /// unrecognized firmware states are surfaced instead of misrepresented.
    #[error("Unknown alarm status code: {0}")]
    UnknownAlarmStatus(i64),

    /// The device reported a timer status code outside the known range.
    #[error("Unknown timer status code: {0}")]
    UnknownTimerStatus(i64),

    /// A deletion id failed local validation.
    #[error("Invalid item id '{id}': {reason}")]
    InvalidItemId {
        /// The id as supplied by the caller.
        id: String,
        /// Why validation rejected it.
        reason: String,
    },

    /// Generic invalid value.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias using homecast-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
