// ── Entity descriptors ──
//
// The unit of output from the projector. Descriptors are immutable once
// published; every poll replaces the whole list.

use std::fmt;

use clashmon_api::{ApiRequest, Method};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The fixed set of entity variants a Clash instance is projected into.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityType {
    TrafficSensor,
    TotalTrafficSensor,
    MemorySensor,
    ConnectionSensor,
    ProxyGroupSensor,
    ProxyGroupSelector,
    StreamingDetection,
    FakeipFlushButton,
}

impl EntityType {
    /// Command-type entities exist regardless of upstream data.
    pub fn is_placeholder(self) -> bool {
        matches!(self, Self::FakeipFlushButton)
    }
}

/// Scalar entity state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityState {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl EntityState {
    /// Convert a JSON scalar. `null`, arrays and objects have no state.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float)),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Bool(b) => Some(Self::Text(b.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for EntityState {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<i64> for EntityState {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

/// HTTP verb of a bound entity action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ActionMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl ActionMethod {
    pub fn to_method(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Put => Method::PUT,
            Self::Delete => Method::DELETE,
        }
    }
}

/// Controller request bound to a command-type entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityAction {
    pub method: ActionMethod,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl EntityAction {
    pub fn post(path: &str) -> Self {
        Self {
            method: ActionMethod::Post,
            path: path.to_owned(),
            body: None,
        }
    }

    pub fn to_request(&self) -> ApiRequest {
        let req = ApiRequest::new(self.method.to_method(), &self.path);
        match &self.body {
            Some(body) => req.json(body.clone()),
            None => req,
        }
    }
}

/// One projected entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub unique_id: String,
    pub name: String,
    pub entity_type: EntityType,
    #[serde(default)]
    pub state: Option<EntityState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_key: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<EntityAction>,
}

impl EntityDescriptor {
    /// Descriptor without a unique id; the projector stamps ids last.
    pub(crate) fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            unique_id: String::new(),
            name: name.into(),
            entity_type,
            state: None,
            icon: None,
            translation_key: None,
            attributes: Map::new(),
            options: None,
            action: None,
        }
    }

    pub(crate) fn state(mut self, state: Option<EntityState>) -> Self {
        self.state = state;
        self
    }

    pub(crate) fn icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_owned());
        self
    }

    pub(crate) fn translation_key(mut self, key: impl Into<String>) -> Self {
        self.translation_key = Some(key.into());
        self
    }

    pub(crate) fn attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    pub(crate) fn options(mut self, options: Vec<String>) -> Self {
        self.options = Some(options);
        self
    }

    pub(crate) fn action(mut self, action: EntityAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Copy with the state replaced. The original is left untouched.
    pub fn with_state(&self, state: EntityState) -> Self {
        let mut next = self.clone();
        next.state = Some(state);
        next
    }

    /// State rendered for display, empty when absent.
    pub fn state_text(&self) -> String {
        self.state.as_ref().map(ToString::to_string).unwrap_or_default()
    }
}

/// Lowercase and replace spaces with underscores.
pub fn slugify(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// `{device_id}_{entity_type}_{slug(name)}`
pub fn unique_id(device_id: &str, entity_type: EntityType, name: &str) -> String {
    format!("{device_id}_{entity_type}_{}", slugify(name))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn entity_type_wire_names() {
        assert_eq!(EntityType::FakeipFlushButton.to_string(), "fakeip_flush_button");
        assert_eq!(
            serde_json::to_value(EntityType::ProxyGroupSelector).unwrap(),
            json!("proxy_group_selector")
        );
        assert_eq!(
            "total_traffic_sensor".parse::<EntityType>().unwrap(),
            EntityType::TotalTrafficSensor
        );
    }

    #[test]
    fn unique_id_slugs_the_name() {
        assert_eq!(
            unique_id("http___h_9090__device", EntityType::TrafficSensor, "Upload Speed"),
            "http___h_9090__device_traffic_sensor_upload_speed"
        );
    }

    #[test]
    fn state_from_json_scalars() {
        assert_eq!(EntityState::from_json(&json!(42)), Some(EntityState::Integer(42)));
        assert_eq!(EntityState::from_json(&json!(1.5)), Some(EntityState::Float(1.5)));
        assert_eq!(EntityState::from_json(&json!("HK")), Some(EntityState::from("HK")));
        assert_eq!(EntityState::from_json(&Value::Null), None);
        assert_eq!(EntityState::from_json(&json!([1])), None);
    }

    #[test]
    fn action_builds_request() {
        let req = EntityAction::post("cache/fakeip/flush").to_request();
        assert_eq!(req.to_string(), "POST cache/fakeip/flush");
        assert!(req.body().is_none());
    }

    #[test]
    fn with_state_leaves_original_untouched() {
        let original = EntityDescriptor::new("Proxy", EntityType::ProxyGroupSelector)
            .state(Some(EntityState::from("HK")));
        let next = original.with_state(EntityState::from("JP"));
        assert_eq!(original.state_text(), "HK");
        assert_eq!(next.state_text(), "JP");
    }
}
