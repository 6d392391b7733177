//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use clashmon_api::ErrorKind;
use clashmon_config::ConfigError;
use clashmon_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to controller at {url}")]
    #[diagnostic(
        code(clashmon::connection_failed),
        help(
            "Check that the Clash core is running and external-controller is reachable.\n\
             Cause: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    /// The first refresh failed. `key` is the setup error key.
    #[error("Controller is not ready ({key}): {reason}")]
    #[diagnostic(
        code(clashmon::not_ready),
        help("Run: clashmon check  to diagnose the endpoint and secret.")
    )]
    NotReady {
        key: &'static str,
        reason: String,
        kind: Option<ErrorKind>,
    },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed")]
    #[diagnostic(
        code(clashmon::auth_failed),
        help(
            "The controller rejected the secret.\n\
             Compare it with `secret:` in the Clash config, then run:\n\
             clashmon config set token <secret>"
        )
    )]
    AuthFailed,

    #[error("No token configured for profile '{profile}'")]
    #[diagnostic(
        code(clashmon::no_credentials),
        help(
            "Configure a token with: clashmon config init\n\
             Or set the CLASHMON_TOKEN environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(clashmon::not_found),
        help("Run: clashmon {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error ({code}): {message}")]
    #[diagnostic(code(clashmon::api_error))]
    ApiError { code: String, message: String },

    #[error("{operation} failed: {message}")]
    #[diagnostic(code(clashmon::operation_failed))]
    OperationFailed {
        operation: String,
        message: String,
        kind: Option<ErrorKind>,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(clashmon::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(clashmon::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: clashmon config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No controller configured")]
    #[diagnostic(
        code(clashmon::no_config),
        help(
            "Create a profile with: clashmon config init\n\
             Expected at: {path}\n\
             Or pass --endpoint and --token."
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(clashmon::config))]
    Config { message: String },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(clashmon::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(clashmon::timeout),
        help("Increase timeout with --timeout or check controller responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(clashmon::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotReady { kind, .. } | Self::OperationFailed { kind, .. } => match kind {
                Some(ErrorKind::Auth) => exit_code::AUTH,
                Some(ErrorKind::Timeout) => exit_code::TIMEOUT,
                Some(ErrorKind::Connection) => exit_code::CONNECTION,
                _ => exit_code::GENERAL,
            },
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let key = err.setup_error_key();
        match err {
            CoreError::NotReady { reason, kind } => CliError::NotReady { key, reason, kind },

            CoreError::UpdateFailed { reason, .. } => CliError::ApiError {
                code: "update_failed".into(),
                message: reason,
            },

            CoreError::Stopped => CliError::ApiError {
                code: "stopped".into(),
                message: "coordinator is stopped".into(),
            },

            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url: if url.is_empty() {
                    "(configured endpoint)".into()
                } else {
                    url
                },
                reason,
            },

            CoreError::AuthenticationFailed { .. } => CliError::AuthFailed,

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::NotFound { identifier } => CliError::NotFound {
                resource_type: "entity".into(),
                identifier,
                list_command: "entities list".into(),
            },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::OperationFailed { operation, message, kind } => {
                CliError::OperationFailed { operation, message, kind }
            }

            CoreError::Api { message, status } => CliError::ApiError {
                code: status.map_or_else(|| "client".into(), |s| s.to_string()),
                message,
            },

            CoreError::Config { message } => CliError::Config { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: "(see: clashmon config profiles)".into(),
            },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_exit_code_follows_kind() {
        let auth: CliError = CoreError::NotReady {
            reason: "401".into(),
            kind: Some(ErrorKind::Auth),
        }
        .into();
        assert_eq!(auth.exit_code(), exit_code::AUTH);
        assert!(auth.to_string().contains("invalid_token"));

        let timeout: CliError = CoreError::NotReady {
            reason: "slow".into(),
            kind: Some(ErrorKind::Timeout),
        }
        .into();
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);
        assert!(timeout.to_string().contains("timed_out"));
    }

    #[test]
    fn operation_failure_keeps_the_operation_name() {
        let err: CliError = CoreError::OperationFailed {
            operation: "dns_query".into(),
            message: "HTTP 500".into(),
            kind: Some(ErrorKind::Client),
        }
        .into();
        assert_eq!(err.to_string(), "dns_query failed: HTTP 500");
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn operation_failure_exit_code_follows_kind() {
        let err: CliError = CoreError::OperationFailed {
            operation: "query_rules".into(),
            message: "Authentication failed: bad token".into(),
            kind: Some(ErrorKind::Auth),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn missing_token_maps_to_auth_exit() {
        let err: CliError = ConfigError::NoCredentials {
            profile: "home".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}
