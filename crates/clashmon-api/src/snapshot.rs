// Data aggregation: one cycle's worth of controller reads.
//
// All endpoint fetches (and optional streaming probes) run concurrently.
// A failing endpoint leaves its section empty instead of failing the
// whole snapshot; the projector treats empty sections as "skip".

use futures_util::future::join_all;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::ClashClient;
use crate::probe::{ProbeResult, STREAMING_SERVICES, probe_url};
use crate::request::ApiRequest;
use crate::transport::TransportConfig;

/// The controller endpoints read every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Endpoint {
    Memory,
    Traffic,
    Connections,
    Proxies,
}

impl Endpoint {
    pub const ALL: [Self; 4] = [Self::Memory, Self::Traffic, Self::Connections, Self::Proxies];

    pub fn path(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Traffic => "traffic",
            Self::Connections => "connections",
            Self::Proxies => "proxies",
        }
    }

    /// NDJSON record to read. The first `memory` record is always zero.
    pub fn line(self) -> usize {
        match self {
            Self::Memory => 2,
            Self::Traffic => 1,
            Self::Connections | Self::Proxies => 0,
        }
    }

    pub fn request(self) -> ApiRequest {
        ApiRequest::get(self.path()).read_line(self.line())
    }
}

/// Aggregated controller state for one polling cycle.
///
/// Sections are raw JSON; a `Null` or `{}` section means the fetch failed
/// or returned nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub memory: Value,
    #[serde(default)]
    pub traffic: Value,
    #[serde(default)]
    pub connections: Value,
    #[serde(default)]
    pub proxies: Value,
    /// Service key to probe result. Empty when probing is disabled.
    #[serde(default)]
    pub streaming: IndexMap<String, ProbeResult>,
}

impl Snapshot {
    pub fn section(&self, endpoint: Endpoint) -> &Value {
        match endpoint {
            Endpoint::Memory => &self.memory,
            Endpoint::Traffic => &self.traffic,
            Endpoint::Connections => &self.connections,
            Endpoint::Proxies => &self.proxies,
        }
    }

    pub fn set_section(&mut self, endpoint: Endpoint, value: Value) {
        match endpoint {
            Endpoint::Memory => self.memory = value,
            Endpoint::Traffic => self.traffic = value,
            Endpoint::Connections => self.connections = value,
            Endpoint::Proxies => self.proxies = value,
        }
    }

    /// Endpoints whose section carries data.
    pub fn populated(&self) -> Vec<Endpoint> {
        Endpoint::ALL
            .into_iter()
            .filter(|e| !is_empty_section(self.section(*e)))
            .collect()
    }
}

/// `true` for `null`, `{}` and `[]`.
pub fn is_empty_section(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

impl ClashClient {
    /// Fetch every endpoint concurrently, plus streaming probes when asked.
    pub async fn fetch_snapshot(&self, include_streaming: bool) -> Snapshot {
        let endpoints = join_all(
            Endpoint::ALL
                .into_iter()
                .map(|endpoint| async move { (endpoint, self.send_with_retry(&endpoint.request()).await) }),
        );
        let streaming = async {
            if include_streaming {
                self.probe_streaming_services().await
            } else {
                IndexMap::new()
            }
        };

        let (results, streaming) = tokio::join!(endpoints, streaming);

        let mut snapshot = Snapshot {
            streaming,
            ..Snapshot::default()
        };
        for (endpoint, result) in results {
            match result {
                Ok(value) => snapshot.set_section(endpoint, value),
                Err(e) => warn!(%endpoint, error = %e, "endpoint fetch failed, section left empty"),
            }
        }
        debug!(
            populated = snapshot.populated().len(),
            streaming = snapshot.streaming.len(),
            "snapshot fetched"
        );
        snapshot
    }

    /// Probe every known streaming service concurrently.
    ///
    /// Probes use a separate unauthenticated client with verified TLS.
    pub async fn probe_streaming_services(&self) -> IndexMap<String, ProbeResult> {
        let http = match TransportConfig::probe().build_client() {
            Ok(http) => http,
            Err(e) => {
                warn!(error = %e, "could not build probe client");
                return STREAMING_SERVICES
                    .iter()
                    .map(|s| (s.key.to_owned(), ProbeResult::unreachable()))
                    .collect();
            }
        };

        let results = join_all(STREAMING_SERVICES.iter().map(|service| {
            let http = &http;
            async move { (service.key.to_owned(), probe_url(http, service.url).await) }
        }))
        .await;

        results.into_iter().collect()
    }
}
