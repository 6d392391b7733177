// ── Service commands ──
//
// Typed operations issued through `Coordinator::execute`. Every call uses
// the strict request mode; failures surface as `CoreError` naming the
// operation.

mod bounded;
pub mod filter;
pub mod requests;

use clashmon_api::{ApiRequest, ClashClient, ConnectionsResponse, Method, RulesResponse};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::projector::FLUSH_FAKEIP_PATH;

pub use bounded::for_each_bounded;
pub use filter::{ConnectionFilter, RuleFilter, TermFilter};
pub use requests::*;

/// A service operation against the controller.
#[derive(Debug, Clone, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Command {
    RebootCore,
    FlushFakeIpCache,
    FilterConnections(FilterConnectionsRequest),
    TestLatency(TestLatencyRequest),
    DnsQuery(DnsQueryRequest),
    QueryRules(QueryRulesRequest),
    ApiCall(ApiCallRequest),
    SelectProxy(SelectProxyRequest),
}

impl Command {
    /// Operation name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// Outcome of a [`Command`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CommandResult {
    Ok,
    Connections(ConnectionReport),
    Latency(LatencyReport),
    Dns(Value),
    Rules(RulesReport),
    ApiCall(ApiCallReport),
}

/// Route one command to its controller calls.
pub(crate) async fn route(
    client: &ClashClient,
    concurrency_limit: usize,
    command: Command,
) -> Result<CommandResult, CoreError> {
    let name = command.name();
    debug!(command = name, "executing command");

    let result = match command {
        Command::RebootCore => client
            .send(&ApiRequest::post("restart"))
            .await
            .map(|_| CommandResult::Ok)
            .map_err(CoreError::from),
        Command::FlushFakeIpCache => client
            .send(&ApiRequest::post(FLUSH_FAKEIP_PATH))
            .await
            .map(|_| CommandResult::Ok)
            .map_err(CoreError::from),
        Command::FilterConnections(req) => filter_connections(client, concurrency_limit, &req)
            .await
            .map(CommandResult::Connections),
        Command::TestLatency(req) => test_latency(client, &req).await.map(CommandResult::Latency),
        Command::DnsQuery(req) => dns_query(client, &req).await.map(CommandResult::Dns),
        Command::QueryRules(req) => query_rules(client, &req).await.map(CommandResult::Rules),
        Command::ApiCall(req) => api_call(client, &req).await.map(CommandResult::ApiCall),
        Command::SelectProxy(req) => select_proxy(client, &req.group, &req.option)
            .await
            .map(|()| CommandResult::Ok),
    };

    result.map_err(|e| {
        warn!(command = name, error = %e, "command failed");
        CoreError::operation(name, e)
    })
}

// ── Connections ──────────────────────────────────────────────────

async fn filter_connections(
    client: &ClashClient,
    concurrency_limit: usize,
    req: &FilterConnectionsRequest,
) -> Result<ConnectionReport, CoreError> {
    let filter = ConnectionFilter::new(
        req.host.as_deref(),
        req.source.as_deref(),
        req.destination.as_deref(),
    );

    let raw = client.send(&ApiRequest::get("connections")).await?;
    let all: ConnectionsResponse = decode(raw)?;
    let connections: Vec<_> = all.connections.into_iter().filter(|c| filter.matches(c)).collect();

    let mut report = ConnectionReport {
        connection_number: connections.len(),
        connection_closed: req.close,
        connections,
        close_failures: Vec::new(),
    };
    if !req.close {
        return Ok(report);
    }

    if filter.is_unfiltered() {
        client.send(&ApiRequest::delete("connections")).await?;
        info!(count = report.connection_number, "closed all connections");
        return Ok(report);
    }

    let ids: Vec<String> = report.connections.iter().map(|c| c.id.clone()).collect();
    let outcomes = for_each_bounded(ids, concurrency_limit, move |id| async move {
        let req = ApiRequest::from_segments(Method::DELETE, ["connections", id.as_str()]);
        let outcome = client.send(&req).await;
        (id, outcome)
    })
    .await;

    for (id, outcome) in outcomes {
        if let Err(e) = outcome {
            warn!(connection = %id, error = %e, "failed to close connection");
            report.close_failures.push(CloseFailure {
                id,
                error: e.to_string(),
            });
        }
    }
    info!(
        matched = report.connection_number,
        failed = report.close_failures.len(),
        "closed filtered connections"
    );
    Ok(report)
}

// ── Latency ──────────────────────────────────────────────────────

async fn test_latency(client: &ClashClient, req: &TestLatencyRequest) -> Result<LatencyReport, CoreError> {
    let group = req.group.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let node = req.node.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let (kind, target) = match (group, node) {
        (Some(group), None) => ("group", group),
        (None, Some(node)) => ("proxies", node),
        _ => {
            return Err(CoreError::ValidationFailed {
                message: "exactly one of group or node must be provided".into(),
            });
        }
    };

    let request = ApiRequest::from_segments(Method::GET, [kind, target, "delay"])
        .query("url", req.url.as_deref().unwrap_or(DEFAULT_LATENCY_URL))
        .query("timeout", req.timeout_ms.unwrap_or(DEFAULT_LATENCY_TIMEOUT_MS));
    let response = client.send(&request).await?;

    if group.is_some() {
        Ok(sort_group_latency(&response))
    } else {
        let delay = response
            .get("delay")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        let mut latency = Map::new();
        latency.insert(target.to_owned(), delay);
        Ok(LatencyReport::Node { latency })
    }
}

/// Order a `{member: delay}` map ascending by delay.
pub fn sort_group_latency(response: &Value) -> LatencyReport {
    let mut latency: Vec<(String, i64)> = response
        .as_object()
        .map(|members| {
            members
                .iter()
                .filter_map(|(name, delay)| delay.as_i64().map(|d| (name.clone(), d)))
                .collect()
        })
        .unwrap_or_default();
    latency.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    LatencyReport::Group {
        fastest_node: latency.first().map(|(name, _)| name.clone()),
        latency,
    }
}

// ── DNS / rules ──────────────────────────────────────────────────

async fn dns_query(client: &ClashClient, req: &DnsQueryRequest) -> Result<Value, CoreError> {
    let record_type = req.record_type.as_deref().unwrap_or(DEFAULT_DNS_RECORD_TYPE);
    let request = ApiRequest::get("dns/query")
        .query("name", &req.name)
        .query("type", record_type);
    Ok(client.send(&request).await?)
}

async fn query_rules(client: &ClashClient, req: &QueryRulesRequest) -> Result<RulesReport, CoreError> {
    let filter = RuleFilter::new(req.rule_type.as_deref(), req.payload.as_deref(), req.proxy.as_deref());
    let raw = client.send(&ApiRequest::get("rules")).await?;
    let all: RulesResponse = decode(raw)?;
    Ok(RulesReport {
        rules: all.rules.into_iter().filter(|r| filter.matches(r)).collect(),
    })
}

// ── Raw API / proxy selection ────────────────────────────────────

async fn api_call(client: &ClashClient, req: &ApiCallRequest) -> Result<ApiCallReport, CoreError> {
    let method = Method::from_bytes(req.method.trim().to_uppercase().as_bytes()).map_err(|_| {
        CoreError::ValidationFailed {
            message: format!("invalid HTTP method {:?}", req.method),
        }
    })?;

    let mut request = ApiRequest::raw(method, req.endpoint.trim()).read_line(req.read_line);
    for (key, value) in parse_object(req.params.as_deref()) {
        let value = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        request = request.query(key, value);
    }
    if req.data.is_some() {
        request = request.json(Value::Object(parse_object(req.data.as_deref())));
    }

    let response = client.send(&request).await?;
    Ok(ApiCallReport { response })
}

pub(crate) async fn select_proxy(client: &ClashClient, group: &str, option: &str) -> Result<(), CoreError> {
    let request = ApiRequest::from_segments(Method::PUT, ["proxies", group])
        .json(serde_json::json!({ "name": option }));
    client.send(&request).await?;
    info!(group, option, "proxy selected");
    Ok(())
}

/// Parse a JSON object string. Anything else becomes an empty object.
pub fn parse_object(raw: Option<&str>) -> Map<String, Value> {
    match raw.map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Object(map))) => map,
        _ => Map::new(),
    }
}

fn decode<T: serde::de::DeserializeOwned>(raw: Value) -> Result<T, CoreError> {
    serde_json::from_value(raw).map_err(|e| CoreError::Api {
        message: format!("unexpected response shape: {e}"),
        status: None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn command_names() {
        assert_eq!(Command::RebootCore.name(), "reboot_core");
        assert_eq!(
            Command::FilterConnections(FilterConnectionsRequest::default()).name(),
            "filter_connections"
        );
        assert_eq!(Command::FlushFakeIpCache.name(), "flush_fake_ip_cache");
    }

    #[test]
    fn group_latency_sorted_fastest_first() {
        let report = sort_group_latency(&json!({"JP-01": 180, "HK-01": 45, "US-01": 320}));
        assert_eq!(
            report,
            LatencyReport::Group {
                fastest_node: Some("HK-01".into()),
                latency: vec![("HK-01".into(), 45), ("JP-01".into(), 180), ("US-01".into(), 320)],
            }
        );
    }

    #[test]
    fn empty_group_latency_has_no_fastest_node() {
        let report = sort_group_latency(&json!({}));
        assert_eq!(
            serde_json::to_value(report).unwrap(),
            json!({"fastest_node": null, "latency": []})
        );
    }

    #[test]
    fn parse_object_accepts_only_objects() {
        assert_eq!(parse_object(Some(r#"{"a": 1}"#)).get("a"), Some(&json!(1)));
        assert!(parse_object(Some("[1, 2]")).is_empty());
        assert!(parse_object(Some("not json")).is_empty());
        assert!(parse_object(None).is_empty());
    }
}
