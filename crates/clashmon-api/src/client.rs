// Clash external-controller HTTP client
//
// Owns the bearer token, the controller base URL and a lazily created
// HTTP session. Every call goes through `send`, which handles auth,
// status mapping and the streaming NDJSON endpoints. Higher-level
// fetches (snapshot aggregation, probes) live in sibling modules as
// inherent methods.

use std::sync::RwLock;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::Error;
use crate::models::VersionInfo;
use crate::ndjson::NdjsonReader;
use crate::request::ApiRequest;
use crate::retry::RetryPolicy;
use crate::transport::TransportConfig;

const BODY_PREVIEW_CHARS: usize = 200;

/// The empty JSON object returned for 204 responses, truncated streams,
/// and suppressed failures.
pub fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Stable device identifier derived from the controller URL.
///
/// Lowercased, trailing underscores trimmed, every non-alphanumeric
/// character replaced with `_`, then suffixed with `_device`.
pub fn device_id_for(endpoint: &str) -> String {
    let trimmed = endpoint.trim().to_lowercase();
    let trimmed = trimmed.trim_end_matches('_');
    let mut id: String = trimmed
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    id.push_str("_device");
    id
}

/// Async client for one Clash controller.
///
/// The HTTP session is created on first use and reused until
/// [`close`](Self::close); a closed client transparently opens a new one
/// on the next request.
pub struct ClashClient {
    base_url: Url,
    token: SecretString,
    device_id: String,
    transport: TransportConfig,
    retry: RetryPolicy,
    session: RwLock<Option<reqwest::Client>>,
}

impl ClashClient {
    pub fn new(base_url: Url, token: SecretString, transport: TransportConfig) -> Self {
        let device_id = device_id_for(base_url.as_str());
        Self {
            base_url,
            token,
            device_id,
            transport,
            retry: RetryPolicy::default(),
            session: RwLock::new(None),
        }
    }

    /// Replace the retry policy used by [`send_with_retry`](Self::send_with_retry).
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    // ── Session lifecycle ────────────────────────────────────────────

    /// Whether an HTTP session is currently open.
    pub fn is_open(&self) -> bool {
        self.session.read().expect("session lock poisoned").is_some()
    }

    /// Drop the HTTP session. Idempotent.
    pub fn close(&self) {
        if self
            .session
            .write()
            .expect("session lock poisoned")
            .take()
            .is_some()
        {
            debug!(endpoint = %self.base_url, "session closed");
        }
    }

    fn session(&self) -> Result<reqwest::Client, Error> {
        if let Some(http) = self.session.read().expect("session lock poisoned").as_ref() {
            return Ok(http.clone());
        }

        let mut guard = self.session.write().expect("session lock poisoned");
        if let Some(http) = guard.as_ref() {
            return Ok(http.clone());
        }
        let http = self.transport.build_client()?;
        debug!(endpoint = %self.base_url, "session opened");
        *guard = Some(http.clone());
        Ok(http)
    }

    // ── Request modes ────────────────────────────────────────────────

    /// Perform one request. Failures are returned as classified errors.
    pub async fn send(&self, req: &ApiRequest) -> Result<Value, Error> {
        let http = self.session()?;
        let url = req.url(&self.base_url)?;
        let timeout_secs = self.transport.timeout_secs();

        debug!(method = %req.method(), %url, line = req.line_index(), "request");

        let mut builder = http
            .request(req.method().clone(), url)
            .bearer_auth(self.token.expose_secret());
        if !req.query_pairs().is_empty() {
            builder = builder.query(req.query_pairs());
        }
        if let Some(body) = req.body() {
            builder = builder.json(body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, timeout_secs))?;
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "invalid or missing bearer token".into(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                message: preview(&body),
            });
        }
        if status == StatusCode::NO_CONTENT {
            trace!(request = %req, "no content");
            return Ok(empty_object());
        }

        match req.line_index() {
            0 => decode_body(resp, timeout_secs).await,
            n => read_line(resp, n, timeout_secs).await,
        }
    }

    /// Perform one request, turning any failure into an empty object.
    pub async fn send_suppressed(&self, req: &ApiRequest) -> Value {
        match self.send(req).await {
            Ok(value) => value,
            Err(e) => {
                warn!(request = %req, error = %e, "request failed, using empty result");
                empty_object()
            }
        }
    }

    /// Perform one request, retrying transient failures per the client's policy.
    pub async fn send_with_retry(&self, req: &ApiRequest) -> Result<Value, Error> {
        let label = req.to_string();
        self.retry.run(&label, || self.send(req)).await
    }

    // ── Identity ─────────────────────────────────────────────────────

    /// Fetch `version` and require it to carry a `version` key.
    pub async fn check_connection(&self) -> Result<VersionInfo, Error> {
        let value = self.send(&ApiRequest::get("version")).await?;
        if value.get("version").is_none() {
            return Err(Error::UnexpectedPayload(
                "missing version key in response; is this endpoint running Clash?".into(),
            ));
        }
        serde_json::from_value(value.clone()).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: value.to_string(),
        })
    }

    /// `true` when [`check_connection`](Self::check_connection) succeeds.
    pub async fn connected(&self) -> bool {
        match self.check_connection().await {
            Ok(_) => true,
            Err(e) => {
                debug!(endpoint = %self.base_url, error = %e, "connection check failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for ClashClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClashClient")
            .field("base_url", &self.base_url.as_str())
            .field("device_id", &self.device_id)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

async fn decode_body(resp: reqwest::Response, timeout_secs: u64) -> Result<Value, Error> {
    let body = resp
        .text()
        .await
        .map_err(|e| Error::from_reqwest(e, timeout_secs))?;
    if body.trim().is_empty() {
        return Ok(empty_object());
    }
    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(&body)),
        body,
    })
}

/// Read chunks until the `n`-th non-blank line is complete, then drop the
/// response so the controller stops streaming.
async fn read_line(
    mut resp: reqwest::Response,
    n: usize,
    timeout_secs: u64,
) -> Result<Value, Error> {
    let mut reader = NdjsonReader::new(n);

    while let Some(chunk) = resp
        .chunk()
        .await
        .map_err(|e| Error::from_reqwest(e, timeout_secs))?
    {
        if let Some(value) = reader.push(&chunk)? {
            return Ok(value);
        }
    }

    if let Some(value) = reader.finish()? {
        return Ok(value);
    }
    debug!(wanted = n, seen = reader.seen(), "stream ended before requested line");
    Ok(empty_object())
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn device_id_replaces_punctuation() {
        assert_eq!(
            device_id_for("http://192.168.1.1:9090/"),
            "http___192_168_1_1_9090__device"
        );
    }

    #[test]
    fn device_id_is_case_and_whitespace_insensitive() {
        assert_eq!(
            device_id_for("  HTTPS://Router.LAN/clash/ "),
            device_id_for("https://router.lan/clash/")
        );
    }

    #[test]
    fn device_id_trims_trailing_underscores_before_mapping() {
        assert_eq!(device_id_for("host__"), "host_device");
    }

    #[test]
    fn new_client_is_closed_until_used() {
        let client = ClashClient::new(
            Url::parse("http://127.0.0.1:9090/").unwrap(),
            SecretString::from("secret"),
            TransportConfig::default(),
        );
        assert!(!client.is_open());
        client.close();
        assert!(!client.is_open());
        assert_eq!(client.device_id(), "http___127_0_0_1_9090__device");
    }

    #[test]
    fn debug_output_hides_token() {
        let client = ClashClient::new(
            Url::parse("http://127.0.0.1:9090/").unwrap(),
            SecretString::from("hunter2"),
            TransportConfig::default(),
        );
        assert!(!format!("{client:?}").contains("hunter2"));
    }
}
