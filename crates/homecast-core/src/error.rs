//! Error types for homecast-core.
//!
//! Every per-device, per-call failure in the engine is classified into one
//! of these variants. None of them is fatal: the orchestrator converts each
//! into a device-availability change plus a log entry, and the next
//! scheduled poll cycle is the implicit retry. Only [`Error::Unauthorized`]
//! has cross-device effect (fleet-wide token invalidation).
//!
//! | Variant | Effect | Log severity |
//! |---------|--------|--------------|
//! | `Unauthorized` | fleet-wide re-auth | debug (poll) / warn (write) |
//! | `NotFound` | device unavailable | debug |
//! | `Unreachable` | device unavailable | debug (poll) / warn (write) |
//! | `Timeout` | device unavailable | debug |
//! | `UnexpectedStatus` | device unavailable | error |
//! | `MalformedResponse` | call's state discarded | error |
//! | `InvalidItemId` | rejected before any network call | — |

use std::time::Duration;

use thiserror::Error;

use homecast_types::ParseError;

/// Errors that can occur when talking to a device's local control surface.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The device rejected the auth token (HTTP 401).
    ///
    /// The observed failure mode is a fleet-wide credential rotation, so the
    /// caller must trigger fleet-wide token invalidation, not a single-device
    /// refresh.
    #[error("Device rejected the local auth token")]
    Unauthorized,

    /// The device does not support this endpoint (HTTP 404).
    ///
    /// Expected for hardware without assistant features; not alarming.
    #[error("Endpoint not supported by device: {endpoint}")]
    NotFound {
        /// The endpoint that was requested.
        endpoint: String,
    },

    /// The connection could not be established; the device is probably offline.
    #[error("Device unreachable: {message}")]
    Unreachable {
        /// Transport-level description of the failure.
        message: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout that applied.
        duration: Duration,
    },

    /// The device returned a status outside the expected set.
    #[error("Unexpected response status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, as text, for diagnostics.
        body: String,
    },

    /// A 200 response was missing fields the endpoint contract requires.
    ///
    /// The partial state from that call is discarded; sibling calls and
    /// other devices are unaffected.
    #[error("Malformed response from {endpoint}: {message}")]
    MalformedResponse {
        /// The endpoint that produced the response.
        endpoint: String,
        /// What was wrong with it.
        message: String,
    },

    /// A deletion id failed local validation; no network call was made.
    #[error("Invalid item id '{id}': {reason}")]
    InvalidItemId {
        /// The id as supplied by the caller.
        id: String,
        /// Why validation rejected it.
        reason: String,
    },

    /// No device with this id is currently known to the registry.
    #[error("Unknown device id: {device_id}")]
    UnknownDevice {
        /// The id that was looked up.
        device_id: String,
    },

    /// The device record has no IP address, so it cannot be polled.
    #[error("Device {device} has no IP address")]
    MissingIpAddress {
        /// Display name of the device.
        device: String,
    },

    /// The device record has no auth token, so it cannot be polled.
    #[error("Device {device} has no auth token")]
    MissingAuthToken {
        /// Display name of the device.
        device: String,
    },

    /// A device-reported record failed domain parsing.
    #[error(transparent)]
    Parse(ParseError),
}

impl Error {
    /// Whether this failure must trigger fleet-wide token invalidation.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Error::Unauthorized)
    }

    /// Whether this failure marks the device unavailable.
    ///
    /// A malformed body arrived over a working connection, so it does not;
    /// local validation failures never reached the device at all.
    #[must_use]
    pub fn marks_unavailable(&self) -> bool {
        !matches!(
            self,
            Error::MalformedResponse { .. } | Error::InvalidItemId { .. } | Error::Parse(_)
        )
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a malformed-response error.
    pub fn malformed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::InvalidItemId { id, reason } => Error::InvalidItemId { id, reason },
            other => Error::Parse(other),
        }
    }
}

/// Result type alias using homecast-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
