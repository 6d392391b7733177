// Streaming-service reachability probes.
//
// Probes are plain unauthenticated GETs against third-party sites. Any
// HTTP answer counts as a completed probe; the status code is what the
// projector later maps to a label. Timeouts and transport failures yield
// the sentinel `(-1, 0)`.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Label used when a status code is not in a service's table.
pub const UNKNOWN_STATUS: &str = "unknown";

/// A streaming service whose regional availability is probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingService {
    /// Stable key, used in entity ids and as the snapshot map key.
    pub key: &'static str,
    /// Human-readable name, used as the entity name.
    pub name: &'static str,
    pub icon: &'static str,
    /// URL probed with a plain GET.
    pub url: &'static str,
    /// HTTP status code to availability label.
    pub status_codes: &'static [(u16, &'static str)],
}

impl StreamingService {
    /// Map a probe status code to this service's availability label.
    pub fn status_label(&self, code: u16) -> &'static str {
        self.status_codes
            .iter()
            .find(|(c, _)| *c == code)
            .map_or(UNKNOWN_STATUS, |(_, label)| label)
    }

    /// Every label this service can report, `"unknown"` last.
    pub fn labels(&self) -> Vec<&'static str> {
        self.status_codes
            .iter()
            .map(|(_, label)| *label)
            .chain(std::iter::once(UNKNOWN_STATUS))
            .collect()
    }
}

pub static STREAMING_SERVICES: &[StreamingService] = &[StreamingService {
    key: "netflix",
    name: "Netflix",
    icon: "mdi:netflix",
    url: "https://www.netflix.com/title/81280792",
    status_codes: &[
        (200, "unlocked"),
        (403, "blocked"),
        (404, "original_only"),
        (0, "unavailable"),
    ],
}];

/// Look up a service by key.
pub fn find_service(key: &str) -> Option<&'static StreamingService> {
    STREAMING_SERVICES.iter().find(|s| s.key == key)
}

/// Outcome of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Time to response headers in seconds, `-1` when unreachable.
    pub latency: f64,
    /// HTTP status, `0` when unreachable.
    pub status_code: u16,
}

impl ProbeResult {
    pub fn unreachable() -> Self {
        Self {
            latency: -1.0,
            status_code: 0,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.status_code != 0
    }
}

/// GET `url` and record latency and status. Never fails.
pub async fn probe_url(http: &reqwest::Client, url: &str) -> ProbeResult {
    let started = Instant::now();
    match http.get(url).send().await {
        Ok(resp) => {
            let latency = started.elapsed().as_secs_f64();
            let status_code = resp.status().as_u16();
            debug!(url, status_code, latency_secs = latency, "probe complete");
            ProbeResult {
                latency,
                status_code,
            }
        }
        Err(e) => {
            debug!(url, error = %e, "probe failed");
            ProbeResult::unreachable()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn netflix_codes_map_to_labels() {
        let netflix = find_service("netflix").unwrap();
        assert_eq!(netflix.status_label(200), "unlocked");
        assert_eq!(netflix.status_label(403), "blocked");
        assert_eq!(netflix.status_label(404), "original_only");
        assert_eq!(netflix.status_label(0), "unavailable");
        assert_eq!(netflix.status_label(500), "unknown");
    }

    #[test]
    fn labels_end_with_unknown() {
        let netflix = find_service("netflix").unwrap();
        assert_eq!(
            netflix.labels(),
            vec!["unlocked", "blocked", "original_only", "unavailable", "unknown"]
        );
    }

    #[test]
    fn unreachable_sentinel() {
        let r = ProbeResult::unreachable();
        assert!((r.latency + 1.0).abs() < f64::EPSILON);
        assert_eq!(r.status_code, 0);
        assert!(!r.is_reachable());
    }
}
