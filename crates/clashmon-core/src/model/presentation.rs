// ── Presentation binding ──
//
// One exhaustive mapping from entity variant to how a host renders it.

use serde::Serialize;

use super::entity::EntityType;

/// Host platform an entity is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    Sensor,
    Select,
    Button,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceClass {
    DataRate,
    DataSize,
    Enum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StateClass {
    Measurement,
}

/// Rendering hints for one entity variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Presentation {
    pub platform: Platform,
    pub device_class: Option<DeviceClass>,
    pub state_class: Option<StateClass>,
    pub native_unit: Option<&'static str>,
    pub suggested_unit: Option<&'static str>,
    pub display_precision: Option<u8>,
}

impl Presentation {
    const fn plain(platform: Platform) -> Self {
        Self {
            platform,
            device_class: None,
            state_class: None,
            native_unit: None,
            suggested_unit: None,
            display_precision: None,
        }
    }

    const fn measured(
        device_class: DeviceClass,
        native_unit: &'static str,
        suggested_unit: &'static str,
        display_precision: u8,
    ) -> Self {
        Self {
            platform: Platform::Sensor,
            device_class: Some(device_class),
            state_class: Some(StateClass::Measurement),
            native_unit: Some(native_unit),
            suggested_unit: Some(suggested_unit),
            display_precision: Some(display_precision),
        }
    }
}

impl EntityType {
    pub fn presentation(self) -> Presentation {
        match self {
            Self::TrafficSensor => Presentation::measured(DeviceClass::DataRate, "bit/s", "kB/s", 0),
            Self::TotalTrafficSensor => Presentation::measured(DeviceClass::DataSize, "B", "GB", 2),
            Self::MemorySensor => Presentation::measured(DeviceClass::DataSize, "B", "MB", 0),
            Self::ConnectionSensor => Presentation {
                state_class: Some(StateClass::Measurement),
                ..Presentation::plain(Platform::Sensor)
            },
            Self::ProxyGroupSensor => Presentation::plain(Platform::Sensor),
            Self::StreamingDetection => Presentation {
                device_class: Some(DeviceClass::Enum),
                ..Presentation::plain(Platform::Sensor)
            },
            Self::ProxyGroupSelector => Presentation::plain(Platform::Select),
            Self::FakeipFlushButton => Presentation::plain(Platform::Button),
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn platforms() {
        assert_eq!(EntityType::ProxyGroupSelector.presentation().platform, Platform::Select);
        assert_eq!(EntityType::FakeipFlushButton.presentation().platform, Platform::Button);
        let sensors = EntityType::iter()
            .filter(|t| t.presentation().platform == Platform::Sensor)
            .count();
        assert_eq!(sensors, 6);
    }

    #[test]
    fn byte_sensors_carry_units() {
        let total = EntityType::TotalTrafficSensor.presentation();
        assert_eq!(total.native_unit, Some("B"));
        assert_eq!(total.suggested_unit, Some("GB"));
        assert_eq!(total.display_precision, Some(2));

        let rate = EntityType::TrafficSensor.presentation();
        assert_eq!(rate.device_class, Some(DeviceClass::DataRate));
        assert_eq!(rate.native_unit, Some("bit/s"));
    }

    #[test]
    fn streaming_is_an_enum_sensor() {
        let p = EntityType::StreamingDetection.presentation();
        assert_eq!(p.device_class, Some(DeviceClass::Enum));
        assert_eq!(p.state_class, None);
    }
}
