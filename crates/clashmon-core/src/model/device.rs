// ── Device identity ──

use clashmon_api::VersionInfo;
use serde::{Deserialize, Serialize};

/// The Clash instance every entity belongs to.
///
/// `id` is derived from the endpoint URL and never changes for a given
/// configuration. Model and version are filled in once from `GET version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub id: String,
    pub name: String,
    pub manufacturer: String,
    /// `"Meta Core"` or `"Non-Meta Core"`.
    pub model: String,
    pub sw_version: String,
}

impl DeviceIdentity {
    pub fn new(id: impl Into<String>, version: &VersionInfo) -> Self {
        Self {
            id: id.into(),
            name: "Clash Instance".into(),
            manufacturer: "Clash".into(),
            model: version.variant().into(),
            sw_version: version.version_or_unknown().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_from_version() {
        let device = DeviceIdentity::new(
            "dev",
            &VersionInfo {
                version: Some("v1.19.0".into()),
                meta: Some(true),
            },
        );
        assert_eq!(device.name, "Clash Instance");
        assert_eq!(device.model, "Meta Core");
        assert_eq!(device.sw_version, "v1.19.0");

        let bare = DeviceIdentity::new("dev", &VersionInfo::default());
        assert_eq!(bare.model, "Non-Meta Core");
        assert_eq!(bare.sw_version, "unknown");
    }
}
