// ── Typed request and response payloads for Commands ──

use clashmon_api::{Connection, Rule};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_LATENCY_URL: &str = "http://www.gstatic.cn/generate_204";
pub const DEFAULT_LATENCY_TIMEOUT_MS: u32 = 5000;
pub const DEFAULT_DNS_RECORD_TYPE: &str = "A";

// ── Requests ───────────────────────────────────────────────────────

/// Comma-separated, case-insensitive substring filters over open connections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConnectionsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// Close every matching connection after listing.
    #[serde(default)]
    pub close: bool,
}

/// Delay test against a whole group or a single node. Exactly one of
/// `group`/`node` must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestLatencyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsQueryRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRulesRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

/// Raw controller call. `params` and `data` are JSON object strings;
/// anything that does not parse to an object is treated as `{}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCallRequest {
    pub method: String,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default)]
    pub read_line: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectProxyRequest {
    pub group: String,
    pub option: String,
}

// ── Responses ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseFailure {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionReport {
    pub connection_number: usize,
    pub connection_closed: bool,
    pub connections: Vec<Connection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub close_failures: Vec<CloseFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LatencyReport {
    /// Every member's delay, fastest first.
    Group {
        fastest_node: Option<String>,
        latency: Vec<(String, i64)>,
    },
    /// One node's delay keyed by node name.
    Node {
        latency: serde_json::Map<String, Value>,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesReport {
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCallReport {
    pub response: Value,
}
