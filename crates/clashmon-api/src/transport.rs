// Shared transport configuration for building reqwest::Client instances.
//
// The authenticated controller client and the unauthenticated streaming
// probes share TLS and timeout handling through this module.

use std::time::Duration;

use crate::error::Error;

/// Per-call deadline for controller requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Per-call deadline for third-party reachability probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("clashmon/", env!("CARGO_PKG_VERSION"));

/// TLS verification mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Use the built-in root store.
    #[default]
    Verify,
    /// Accept any certificate (self-signed controllers). Opt-in only.
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::Verify,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl TransportConfig {
    /// Config used for streaming-service probes: verified TLS, short deadline.
    pub fn probe() -> Self {
        Self {
            tls: TlsMode::Verify,
            timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Timeout in whole seconds, for error reporting.
    pub fn timeout_secs(&self) -> u64 {
        self.timeout.as_secs()
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT);

        if self.tls == TlsMode::DangerAcceptInvalid {
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_verifies_certificates() {
        let config = TransportConfig::default();
        assert_eq!(config.tls, TlsMode::Verify);
        assert_eq!(config.timeout_secs(), 15);
    }

    #[test]
    fn probe_config_uses_short_deadline() {
        assert_eq!(TransportConfig::probe().timeout, Duration::from_secs(10));
    }

    #[test]
    fn insecure_client_builds() {
        let config = TransportConfig::default().with_tls(TlsMode::DangerAcceptInvalid);
        assert!(config.build_client().is_ok());
    }
}
