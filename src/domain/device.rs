//! Device records and domain classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Device category used to filter bridge devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceDomain {
    Cover,
    Fan,
    #[default]
    Light,
    Sensor,
    Switch,
}

impl DeviceDomain {
    /// Every domain, sorted by name.
    pub const ALL: [Self; 5] = [
        Self::Cover,
        Self::Fan,
        Self::Light,
        Self::Sensor,
        Self::Switch,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cover => "cover",
            Self::Fan => "fan",
            Self::Light => "light",
            Self::Sensor => "sensor",
            Self::Switch => "switch",
        }
    }

    /// Look up a domain by its exact lowercase name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == name)
    }

    /// Comma-separated list of every domain name, sorted.
    #[must_use]
    pub fn names() -> String {
        Self::ALL.map(Self::as_str).join(", ")
    }
}

impl fmt::Display for DeviceDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device as reported by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

impl Device {
    #[must_use]
    pub fn new(
        device_id: impl Into<String>,
        name: impl Into<String>,
        device_type: impl Into<String>,
        zone: Option<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            name: name.into(),
            device_type: device_type.into(),
            zone,
        }
    }
}
