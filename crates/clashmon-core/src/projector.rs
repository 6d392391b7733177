// ── Entity projector ──
//
// Pure functions from one aggregated snapshot to the ordered entity list.
// Missing or empty sections contribute nothing; the flush button is always
// present. Unique ids are stamped after the whole list is built.

use clashmon_api::{ProbeResult, Snapshot, find_service, is_empty_section};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::model::{EntityAction, EntityDescriptor, EntityState, EntityType, unique_id};

const GROUP_ICON: &str = "mdi:network-outline";
const SELECTOR_ATTRIBUTES: &[&str] = &["tfo", "type", "udp", "xudp", "alive", "history"];
const GROUP_SENSOR_EXTRA: &str = "all";

pub const FLUSH_FAKEIP_PATH: &str = "cache/fakeip/flush";

/// Build the full entity list for one snapshot.
pub fn project(snapshot: &Snapshot, device_id: &str, streaming_enabled: bool) -> Vec<EntityDescriptor> {
    let mut entities = Vec::new();
    entities.extend(traffic_entities(&snapshot.traffic));
    entities.extend(connection_entities(&snapshot.connections));
    entities.extend(memory_entities(&snapshot.memory));
    entities.extend(proxy_entities(&snapshot.proxies));
    if streaming_enabled {
        entities.extend(streaming_entities(&snapshot.streaming));
    }
    entities.push(fakeip_flush_button());

    for entity in &mut entities {
        entity.unique_id = unique_id(device_id, entity.entity_type, &entity.name);
    }
    entities
}

/// `true` when the list holds anything besides command placeholders.
pub fn has_data_entities(entities: &[EntityDescriptor]) -> bool {
    entities.iter().any(|e| !e.entity_type.is_placeholder())
}

fn field_state(section: &Value, key: &str) -> Option<EntityState> {
    section.get(key).and_then(EntityState::from_json)
}

pub fn traffic_entities(traffic: &Value) -> Vec<EntityDescriptor> {
    if is_empty_section(traffic) {
        return Vec::new();
    }
    vec![
        EntityDescriptor::new("Upload Speed", EntityType::TrafficSensor)
            .state(field_state(traffic, "up"))
            .icon("mdi:arrow-up")
            .translation_key("up_speed"),
        EntityDescriptor::new("Download Speed", EntityType::TrafficSensor)
            .state(field_state(traffic, "down"))
            .icon("mdi:arrow-down")
            .translation_key("down_speed"),
    ]
}

pub fn connection_entities(connections: &Value) -> Vec<EntityDescriptor> {
    if is_empty_section(connections) {
        return Vec::new();
    }
    let count = connections
        .get("connections")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);

    vec![
        EntityDescriptor::new("Upload Traffic", EntityType::TotalTrafficSensor)
            .state(field_state(connections, "uploadTotal"))
            .icon("mdi:tray-arrow-up")
            .translation_key("up_traffic"),
        EntityDescriptor::new("Download Traffic", EntityType::TotalTrafficSensor)
            .state(field_state(connections, "downloadTotal"))
            .icon("mdi:tray-arrow-down")
            .translation_key("down_traffic"),
        EntityDescriptor::new("Connection Number", EntityType::ConnectionSensor)
            .state(Some(EntityState::Integer(i64::try_from(count).unwrap_or(i64::MAX))))
            .icon("mdi:transit-connection")
            .translation_key("connection_number"),
    ]
}

pub fn memory_entities(memory: &Value) -> Vec<EntityDescriptor> {
    if is_empty_section(memory) {
        return Vec::new();
    }
    vec![
        EntityDescriptor::new("Memory Used", EntityType::MemorySensor)
            .state(field_state(memory, "inuse"))
            .icon("mdi:memory")
            .translation_key("memory_used"),
    ]
}

/// Selector and fallback groups become selectors, URL-test groups become
/// read-only sensors. Plain proxies and other group types are skipped.
pub fn proxy_entities(proxies: &Value) -> Vec<EntityDescriptor> {
    let Some(groups) = proxies.get("proxies").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut entities = Vec::new();
    for (key, item) in groups {
        let name = item.get("name").and_then(Value::as_str).unwrap_or(key);
        let state = field_state(item, "now");

        match item.get("type").and_then(Value::as_str) {
            Some("Selector" | "Fallback") => {
                let options: Vec<String> = item
                    .get("all")
                    .and_then(Value::as_array)
                    .map(|all| all.iter().filter_map(Value::as_str).map(str::to_owned).collect())
                    .unwrap_or_default();
                entities.push(
                    EntityDescriptor::new(name, EntityType::ProxyGroupSelector)
                        .state(state)
                        .icon(GROUP_ICON)
                        .options(options)
                        .attributes(pick(item, SELECTOR_ATTRIBUTES, None)),
                );
            }
            Some("URLTest") => entities.push(
                EntityDescriptor::new(name, EntityType::ProxyGroupSensor)
                    .state(state)
                    .icon(GROUP_ICON)
                    .attributes(pick(item, SELECTOR_ATTRIBUTES, Some(GROUP_SENSOR_EXTRA))),
            ),
            _ => {}
        }
    }
    entities
}

fn pick(item: &Value, keys: &[&str], extra: Option<&str>) -> Map<String, Value> {
    keys.iter()
        .copied()
        .chain(extra)
        .filter_map(|k| item.get(k).map(|v| (k.to_owned(), v.clone())))
        .collect()
}

pub fn streaming_entities(streaming: &IndexMap<String, ProbeResult>) -> Vec<EntityDescriptor> {
    let mut entities = Vec::new();
    for (key, result) in streaming {
        let Some(service) = find_service(key) else {
            debug!(service = %key, "probe result for unknown service ignored");
            continue;
        };

        let attributes = match serde_json::to_value(result) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        entities.push(
            EntityDescriptor::new(service.name, EntityType::StreamingDetection)
                .state(Some(EntityState::from(service.status_label(result.status_code))))
                .icon(service.icon)
                .translation_key(format!("{}_service", service.key))
                .attributes(attributes)
                .options(service.labels().into_iter().map(str::to_owned).collect()),
        );
    }
    entities
}

pub fn fakeip_flush_button() -> EntityDescriptor {
    EntityDescriptor::new("Flush FakeIP Cache", EntityType::FakeipFlushButton)
        .icon("mdi:broom")
        .translation_key("flush_cache")
        .action(EntityAction::post(FLUSH_FAKEIP_PATH))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    const DEVICE: &str = "http___127_0_0_1_9090__device";

    fn full_snapshot() -> Snapshot {
        let mut streaming = IndexMap::new();
        streaming.insert(
            "netflix".to_owned(),
            ProbeResult {
                latency: 0.31,
                status_code: 403,
            },
        );
        Snapshot {
            memory: json!({"inuse": 52_428_800, "oslimit": 0}),
            traffic: json!({"up": 1200, "down": 48_000}),
            connections: json!({
                "uploadTotal": 1_000_000,
                "downloadTotal": 9_000_000,
                "connections": [
                    {"id": "1", "metadata": {"host": "a.com"}},
                    {"id": "2", "metadata": {"host": "b.com"}}
                ]
            }),
            proxies: json!({"proxies": {
                "Proxy": {
                    "name": "Proxy", "type": "Selector", "now": "HK-01",
                    "all": ["HK-01", "JP-01", "DIRECT"],
                    "udp": true, "history": [], "extra": "dropped"
                },
                "Auto": {
                    "name": "Auto", "type": "URLTest", "now": "JP-01",
                    "all": ["HK-01", "JP-01"], "alive": true
                },
                "Backup": {
                    "name": "Backup", "type": "Fallback", "now": "JP-01",
                    "all": ["JP-01", "HK-01"]
                },
                "HK-01": {"name": "HK-01", "type": "Shadowsocks"},
                "DIRECT": {"name": "DIRECT", "type": "Direct"}
            }}),
            streaming,
        }
    }

    fn find<'a>(entities: &'a [EntityDescriptor], name: &str) -> &'a EntityDescriptor {
        entities.iter().find(|e| e.name == name).unwrap()
    }

    #[test]
    fn full_snapshot_projects_every_section() {
        let entities = project(&full_snapshot(), DEVICE, true);
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names[..6],
            [
                "Upload Speed",
                "Download Speed",
                "Upload Traffic",
                "Download Traffic",
                "Connection Number",
                "Memory Used",
            ]
        );
        let mut groups = names[6..9].to_vec();
        groups.sort_unstable();
        assert_eq!(groups, ["Auto", "Backup", "Proxy"]);
        assert_eq!(names[9..], ["Netflix", "Flush FakeIP Cache"]);
        assert_eq!(find(&entities, "Connection Number").state, Some(EntityState::Integer(2)));
        assert_eq!(find(&entities, "Memory Used").state, Some(EntityState::Integer(52_428_800)));
        assert_eq!(
            find(&entities, "Upload Speed").unique_id,
            format!("{DEVICE}_traffic_sensor_upload_speed")
        );
    }

    #[test]
    fn unique_ids_are_unique() {
        let entities = project(&full_snapshot(), DEVICE, true);
        let ids: HashSet<&str> = entities.iter().map(|e| e.unique_id.as_str()).collect();
        assert_eq!(ids.len(), entities.len());
    }

    #[test]
    fn projection_is_idempotent() {
        let snapshot = full_snapshot();
        assert_eq!(project(&snapshot, DEVICE, true), project(&snapshot, DEVICE, true));
    }

    #[test]
    fn selector_groups_expose_options_and_flags() {
        let entities = project(&full_snapshot(), DEVICE, false);
        let proxy = find(&entities, "Proxy");
        assert_eq!(proxy.entity_type, EntityType::ProxyGroupSelector);
        assert_eq!(proxy.state, Some(EntityState::from("HK-01")));
        assert_eq!(
            proxy.options.as_deref().unwrap(),
            ["HK-01", "JP-01", "DIRECT"].map(String::from)
        );
        assert_eq!(
            Value::Object(proxy.attributes.clone()),
            json!({"type": "Selector", "udp": true, "history": []})
        );
        assert_eq!(find(&entities, "Backup").entity_type, EntityType::ProxyGroupSelector);
    }

    #[test]
    fn url_test_groups_are_read_only_sensors() {
        let entities = project(&full_snapshot(), DEVICE, false);
        let auto = find(&entities, "Auto");
        assert_eq!(auto.entity_type, EntityType::ProxyGroupSensor);
        assert!(auto.options.is_none());
        assert_eq!(auto.attributes["all"], json!(["HK-01", "JP-01"]));
        assert_eq!(auto.attributes["alive"], json!(true));
    }

    #[test]
    fn missing_proxies_degrade_gracefully() {
        let mut snapshot = full_snapshot();
        snapshot.proxies = json!({});
        let entities = project(&snapshot, DEVICE, false);

        assert!(entities.iter().all(|e| !matches!(
            e.entity_type,
            EntityType::ProxyGroupSelector | EntityType::ProxyGroupSensor
        )));
        assert!(entities.iter().any(|e| e.entity_type == EntityType::TrafficSensor));
        assert!(entities.iter().any(|e| e.entity_type == EntityType::MemorySensor));
        assert!(entities.iter().any(|e| e.entity_type == EntityType::ConnectionSensor));
        assert_eq!(entities.last().unwrap().entity_type, EntityType::FakeipFlushButton);
    }

    #[test]
    fn empty_snapshot_yields_only_the_button() {
        let entities = project(&Snapshot::default(), DEVICE, true);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].entity_type, EntityType::FakeipFlushButton);
        assert_eq!(
            entities[0].unique_id,
            format!("{DEVICE}_fakeip_flush_button_flush_fakeip_cache")
        );
        assert_eq!(entities[0].action, Some(EntityAction::post(FLUSH_FAKEIP_PATH)));
        assert!(!has_data_entities(&entities));
    }

    #[test]
    fn null_connection_list_counts_zero() {
        let entities = connection_entities(&json!({"uploadTotal": 0, "downloadTotal": 0, "connections": null}));
        assert_eq!(entities[2].state, Some(EntityState::Integer(0)));
    }

    #[test]
    fn streaming_status_maps_through_code_table() {
        let entities = project(&full_snapshot(), DEVICE, true);
        let netflix = find(&entities, "Netflix");
        assert_eq!(netflix.state, Some(EntityState::from("blocked")));
        assert_eq!(netflix.translation_key.as_deref(), Some("netflix_service"));
        assert_eq!(netflix.attributes["status_code"], json!(403));
        assert_eq!(
            netflix.options.as_deref().unwrap(),
            ["unlocked", "blocked", "original_only", "unavailable", "unknown"].map(String::from)
        );

        let mut streaming = IndexMap::new();
        streaming.insert(
            "netflix".to_owned(),
            ProbeResult {
                latency: 0.2,
                status_code: 500,
            },
        );
        let unmapped = streaming_entities(&streaming);
        assert_eq!(unmapped[0].state, Some(EntityState::from("unknown")));
    }

    #[test]
    fn streaming_disabled_skips_probe_results() {
        let entities = project(&full_snapshot(), DEVICE, false);
        assert!(entities.iter().all(|e| e.entity_type != EntityType::StreamingDetection));
    }

    #[test]
    fn unknown_streaming_service_is_skipped() {
        let mut streaming = IndexMap::new();
        streaming.insert("hulu".to_owned(), ProbeResult::unreachable());
        assert!(streaming_entities(&streaming).is_empty());
    }
}
