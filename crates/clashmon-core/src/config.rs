// ── Runtime coordinator configuration ──
//
// Describes *how* to reach one Clash controller and how often to poll it.
// Carries credentials and tuning but never touches disk; the CLI builds a
// `CoordinatorConfig` and hands it in. A changed configuration means a new
// coordinator, never a live patch.

use std::time::Duration;

use clashmon_api::transport::DEFAULT_TIMEOUT;
use clashmon_api::{TlsMode, TransportConfig};
use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 5;
pub const MIN_CONCURRENCY_LIMIT: usize = 1;

/// Configuration for one coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Controller base URL, always with a trailing slash.
    pub endpoint_url: Url,
    /// Bearer token (`secret` in the Clash config).
    pub token: SecretString,
    /// Skip certificate verification. Off unless explicitly enabled.
    pub allow_insecure_tls: bool,
    pub poll_interval: Duration,
    /// Upper bound on concurrent per-connection close requests.
    pub concurrency_limit: usize,
    pub streaming_checks_enabled: bool,
    pub request_timeout: Duration,
}

impl CoordinatorConfig {
    pub fn new(endpoint_url: Url, token: SecretString) -> Self {
        Self {
            endpoint_url,
            token,
            allow_insecure_tls: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            streaming_checks_enabled: false,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Clamp tuning values to their minimums.
    pub fn clamped(mut self) -> Self {
        self.poll_interval = self.poll_interval.max(MIN_POLL_INTERVAL);
        self.concurrency_limit = self.concurrency_limit.max(MIN_CONCURRENCY_LIMIT);
        self
    }

    pub fn transport(&self) -> TransportConfig {
        let tls = if self.allow_insecure_tls {
            TlsMode::DangerAcceptInvalid
        } else {
            TlsMode::Verify
        };
        TransportConfig::default()
            .with_tls(tls)
            .with_timeout(self.request_timeout)
    }
}

/// Normalize a user-entered controller address.
///
/// Adds or rewrites the scheme to match `use_tls` and guarantees a
/// trailing slash so relative endpoint paths join under any base path.
pub fn normalize_endpoint_url(raw: &str, use_tls: bool) -> Result<Url, CoreError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CoreError::Config {
            message: "endpoint URL is empty".into(),
        });
    }

    let scheme = if use_tls { "https" } else { "http" };
    let rest = strip_scheme(raw, "https://")
        .or_else(|| strip_scheme(raw, "http://"))
        .unwrap_or(raw);

    let mut candidate = format!("{scheme}://{rest}");
    if !candidate.ends_with('/') {
        candidate.push('/');
    }

    let url = Url::parse(&candidate).map_err(|e| CoreError::Config {
        message: format!("invalid endpoint URL {raw:?}: {e}"),
    })?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(CoreError::Config {
            message: format!("endpoint URL {raw:?} has no host"),
        });
    }
    Ok(url)
}

/// `raw` without a leading `scheme`, compared case-insensitively.
fn strip_scheme<'a>(raw: &'a str, scheme: &str) -> Option<&'a str> {
    let head = raw.get(..scheme.len())?;
    head.eq_ignore_ascii_case(scheme).then(|| &raw[scheme.len()..])
}
