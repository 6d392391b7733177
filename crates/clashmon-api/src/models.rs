// Wire types for the handful of Clash endpoints the service layer reads
// field-by-field. Everything else travels as raw `serde_json::Value`.
//
// Every field is defaulted and unknown fields are kept in `extra`, so a
// record round-trips back to the caller unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Response of `GET version`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(default)]
    pub version: Option<String>,
    /// `true` on Clash.Meta / mihomo cores.
    #[serde(default)]
    pub meta: Option<bool>,
}

impl VersionInfo {
    /// Core variant label shown as the device model.
    pub fn variant(&self) -> &'static str {
        if self.meta == Some(true) {
            "Meta Core"
        } else {
            "Non-Meta Core"
        }
    }

    /// Version string, or `"unknown"` when the controller did not report one.
    pub fn version_or_unknown(&self) -> &str {
        self.version.as_deref().unwrap_or("unknown")
    }
}

/// Response of `GET connections`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionsResponse {
    #[serde(default)]
    pub upload_total: Option<u64>,
    #[serde(default)]
    pub download_total: Option<u64>,
    /// `null` when the core has no open connections.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub connections: Vec<Connection>,
}

/// One tracked connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub metadata: ConnectionMetadata,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionMetadata {
    #[serde(default)]
    pub host: String,
    #[serde(default, rename = "sourceIP")]
    pub source_ip: String,
    #[serde(default, rename = "destinationIP")]
    pub destination_ip: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of `GET rules`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub rules: Vec<Rule>,
}

/// One routing rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, rename = "type")]
    pub rule_type: String,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub proxy: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn version_variant_labels() {
        let meta: VersionInfo = serde_json::from_value(json!({"version": "v1.18.1", "meta": true})).unwrap();
        assert_eq!(meta.variant(), "Meta Core");
        assert_eq!(meta.version_or_unknown(), "v1.18.1");

        let premium: VersionInfo = serde_json::from_value(json!({"version": "2023.08.17"})).unwrap();
        assert_eq!(premium.variant(), "Non-Meta Core");

        assert_eq!(VersionInfo::default().version_or_unknown(), "unknown");
    }

    #[test]
    fn null_connection_list_is_empty() {
        let resp: ConnectionsResponse = serde_json::from_value(json!({
            "uploadTotal": 10,
            "downloadTotal": 20,
            "connections": null
        }))
        .unwrap();
        assert!(resp.connections.is_empty());
        assert_eq!(resp.upload_total, Some(10));
    }

    #[test]
    fn connection_keeps_unknown_fields() {
        let raw = json!({
            "id": "abc",
            "upload": 1024,
            "chains": ["Proxy", "HK-01"],
            "metadata": {
                "host": "example.com",
                "sourceIP": "192.168.1.20",
                "destinationIP": "93.184.216.34",
                "network": "tcp"
            }
        });
        let conn: Connection = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(conn.metadata.host, "example.com");
        assert_eq!(conn.metadata.source_ip, "192.168.1.20");
        assert_eq!(serde_json::to_value(&conn).unwrap(), raw);
    }
}
