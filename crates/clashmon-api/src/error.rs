use std::error::Error as StdError;

use thiserror::Error;

/// Coarse failure classification callers branch on.
///
/// Every [`Error`] variant maps onto exactly one kind. Only
/// [`Timeout`](ErrorKind::Timeout) and [`Connection`](ErrorKind::Connection)
/// are retried by [`ClashClient::send_with_retry`](crate::ClashClient::send_with_retry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Bearer token rejected by the controller.
    Auth,
    /// No response within the configured deadline.
    Timeout,
    /// Transport-level failure (refused, reset, DNS).
    Connection,
    /// Everything else: bad status, malformed JSON, generic transport fault.
    Client,
}

/// Top-level error type for the `clashmon-api` crate.
///
/// `clashmon-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The controller answered 401.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// Request exceeded the per-call deadline.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Connection refused, reset, or otherwise broken below HTTP.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Any other reqwest failure (builder, redirect, decode).
    #[error("HTTP transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// URL parsing or path construction failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or HTTP client construction failed.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Protocol ────────────────────────────────────────────────────
    /// Non-2xx status other than 401.
    #[error("Unexpected response (HTTP {status}): {message}")]
    Status { status: u16, message: String },

    /// JSON decoding failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// The endpoint answered but does not look like a Clash controller.
    #[error("Unexpected payload: {0}")]
    UnexpectedPayload(String),
}

impl Error {
    /// Classify a raw reqwest failure.
    ///
    /// reqwest reports resets that happen mid-body as request/body errors
    /// rather than connect errors, so the source chain is walked looking
    /// for an `io::Error` before falling back to the generic transport kind.
    pub fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            return Self::Timeout { timeout_secs };
        }
        if err.is_connect() || has_io_source(&err) {
            return Self::Connection {
                message: err.to_string(),
            };
        }
        if err.status() == Some(reqwest::StatusCode::UNAUTHORIZED) {
            return Self::Authentication {
                message: "invalid API credentials".into(),
            };
        }
        Self::Transport(err)
    }

    /// The taxonomy bucket this error falls into.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication { .. } => ErrorKind::Auth,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Transport(_)
            | Self::InvalidUrl(_)
            | Self::Tls(_)
            | Self::Status { .. }
            | Self::Deserialization { .. }
            | Self::UnexpectedPayload(_) => ErrorKind::Client,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Timeout | ErrorKind::Connection)
    }

    /// Returns `true` if the controller rejected the credentials.
    pub fn is_auth(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }

    /// HTTP status code, if the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { .. } => Some(401),
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

fn has_io_source(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(inner) = source {
        if inner.is::<std::io::Error>() {
            return true;
        }
        source = inner.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeout_and_connection_are_transient() {
        assert!(Error::Timeout { timeout_secs: 15 }.is_transient());
        assert!(
            Error::Connection {
                message: "refused".into()
            }
            .is_transient()
        );
        assert!(
            !Error::Authentication {
                message: "nope".into()
            }
            .is_transient()
        );
        assert!(
            !Error::Status {
                status: 500,
                message: "boom".into()
            }
            .is_transient()
        );
        assert!(
            !Error::Deserialization {
                message: "eof".into(),
                body: String::new()
            }
            .is_transient()
        );
    }

    #[test]
    fn kinds_cover_the_taxonomy() {
        assert_eq!(
            Error::Authentication {
                message: String::new()
            }
            .kind(),
            ErrorKind::Auth
        );
        assert_eq!(Error::Timeout { timeout_secs: 1 }.kind(), ErrorKind::Timeout);
        assert_eq!(
            Error::UnexpectedPayload("missing version".into()).kind(),
            ErrorKind::Client
        );
        assert_eq!(ErrorKind::Connection.to_string(), "connection");
    }

    #[test]
    fn status_is_exposed_for_protocol_errors() {
        let err = Error::Status {
            status: 404,
            message: "not found".into(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(
            Error::Authentication {
                message: String::new()
            }
            .status(),
            Some(401)
        );
        assert_eq!(Error::Timeout { timeout_secs: 1 }.status(), None);
    }
}
