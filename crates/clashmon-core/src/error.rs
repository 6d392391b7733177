// ── Core error types ──
//
// User-facing errors from clashmon-core. Consumers never see raw HTTP
// status codes or JSON parse failures; the `From<clashmon_api::Error>`
// impl translates transport-layer errors into domain variants.

use clashmon_api::ErrorKind;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Coordinator lifecycle ────────────────────────────────────────
    /// The first refresh failed; there is no data to serve.
    #[error("Clash controller is not ready: {reason}")]
    NotReady {
        reason: String,
        kind: Option<ErrorKind>,
    },

    /// A later refresh failed; the previous entity snapshot is still served.
    #[error("Update failed (serving last known data): {reason}")]
    UpdateFailed {
        reason: String,
        kind: Option<ErrorKind>,
    },

    #[error("Coordinator is stopped")]
    Stopped,

    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to controller at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Controller request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Entity not found: {identifier}")]
    NotFound { identifier: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("{operation} failed: {message}")]
    OperationFailed {
        operation: String,
        message: String,
        kind: Option<ErrorKind>,
    },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Transport-level classification, where one is known.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::NotReady { kind, .. }
            | Self::UpdateFailed { kind, .. }
            | Self::OperationFailed { kind, .. } => *kind,
            Self::AuthenticationFailed { .. } => Some(ErrorKind::Auth),
            Self::Timeout { .. } => Some(ErrorKind::Timeout),
            Self::ConnectionFailed { .. } => Some(ErrorKind::Connection),
            Self::Api { .. } => Some(ErrorKind::Client),
            _ => None,
        }
    }

    /// Error key reported by an interactive setup flow.
    ///
    /// `invalid_token` for rejected credentials, `timed_out` for deadline
    /// failures, `cannot_connect` for everything else.
    pub fn setup_error_key(&self) -> &'static str {
        match self.kind() {
            Some(ErrorKind::Auth) => "invalid_token",
            Some(ErrorKind::Timeout) => "timed_out",
            _ => "cannot_connect",
        }
    }

    /// Wrap a failure from a named service operation.
    pub(crate) fn operation(operation: &str, err: impl Into<CoreError>) -> Self {
        let err = err.into();
        match err {
            Self::ValidationFailed { .. } | Self::NotFound { .. } | Self::OperationFailed { .. } => err,
            other => Self::OperationFailed {
                operation: operation.to_owned(),
                message: other.to_string(),
                kind: other.kind(),
            },
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<clashmon_api::Error> for CoreError {
    fn from(err: clashmon_api::Error) -> Self {
        match err {
            clashmon_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            clashmon_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            clashmon_api::Error::Connection { message } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: message,
            },
            clashmon_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            clashmon_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            clashmon_api::Error::Status { status, message } => CoreError::Api {
                message: format!("HTTP {status}: {message}"),
                status: Some(status),
            },
            clashmon_api::Error::Transport(ref e) => CoreError::Api {
                message: e.to_string(),
                status: err.status(),
            },
            clashmon_api::Error::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("Deserialization error: {message}"),
                status: None,
            },
            clashmon_api::Error::UnexpectedPayload(message) => CoreError::Api {
                message,
                status: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_keys_follow_error_kind() {
        let auth: CoreError = clashmon_api::Error::Authentication {
            message: "nope".into(),
        }
        .into();
        assert_eq!(auth.setup_error_key(), "invalid_token");

        let timeout: CoreError = clashmon_api::Error::Timeout { timeout_secs: 15 }.into();
        assert_eq!(timeout.setup_error_key(), "timed_out");

        let refused: CoreError = clashmon_api::Error::Connection {
            message: "refused".into(),
        }
        .into();
        assert_eq!(refused.setup_error_key(), "cannot_connect");

        let payload: CoreError = clashmon_api::Error::UnexpectedPayload("no version".into()).into();
        assert_eq!(payload.setup_error_key(), "cannot_connect");
    }

    #[test]
    fn not_ready_keeps_the_transport_kind() {
        let err = CoreError::NotReady {
            reason: "bad token".into(),
            kind: Some(ErrorKind::Auth),
        };
        assert_eq!(err.setup_error_key(), "invalid_token");
    }

    #[test]
    fn operation_wrapping_names_the_operation() {
        let err = CoreError::operation(
            "dns_query",
            clashmon_api::Error::Status {
                status: 500,
                message: "boom".into(),
            },
        );
        assert_eq!(err.to_string(), "dns_query failed: API error: HTTP 500: boom");
        assert_eq!(err.kind(), Some(ErrorKind::Client));

        let auth = CoreError::operation(
            "query_rules",
            clashmon_api::Error::Authentication {
                message: "bad token".into(),
            },
        );
        assert_eq!(auth.kind(), Some(ErrorKind::Auth));
        assert_eq!(auth.setup_error_key(), "invalid_token");

        let validation = CoreError::operation(
            "test_latency",
            CoreError::ValidationFailed {
                message: "pick one".into(),
            },
        );
        assert!(matches!(validation, CoreError::ValidationFailed { .. }));
    }
}
