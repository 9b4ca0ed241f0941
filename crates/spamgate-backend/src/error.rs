//! Typed failures for backend calls.

use thiserror::Error;

/// Errors produced by [`crate::BackendClient::invoke`].
///
/// Display strings are sanitized categories, safe to forward to HTTP
/// clients verbatim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Connection failure or hard-timeout expiry.
    #[error("serving endpoint unreachable")]
    Unreachable,

    /// The backend answered with a non-200 status.
    #[error("serving endpoint returned status {0}")]
    BadStatus(u16),

    /// The backend answered 200 but the body was not a valid
    /// prediction payload.
    #[error("serving endpoint returned a malformed response")]
    MalformedResponse,
}
