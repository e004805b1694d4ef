//! LEAP message types
//!
//! Each message is one JSON object per line. Requests carry a `ClientTag`
//! that the bridge echoes in the matching response; unsolicited messages
//! arrive without one.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::domain::{Device, DeviceDomain};
use crate::error::{BridgeError, Result};

pub const PING_URL: &str = "/server/1/status/ping";
pub const DEVICE_URL: &str = "/device";
pub const SERVER_URL: &str = "/server/1";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LeapRequest {
    pub communique_type: &'static str,
    pub header: RequestHeader,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestHeader {
    pub url: String,
    pub client_tag: String,
}

impl LeapRequest {
    #[must_use]
    pub fn read(url: impl Into<String>, client_tag: impl Into<String>) -> Self {
        Self {
            communique_type: "ReadRequest",
            header: RequestHeader {
                url: url.into(),
                client_tag: client_tag.into(),
            },
            body: None,
        }
    }

    #[must_use]
    pub fn create(url: impl Into<String>, client_tag: impl Into<String>, body: Value) -> Self {
        Self {
            communique_type: "CreateRequest",
            header: RequestHeader {
                url: url.into(),
                client_tag: client_tag.into(),
            },
            body: Some(body),
        }
    }

    /// `GoToLevel` command for a zone.
    #[must_use]
    pub fn go_to_level(zone: &str, level: u8, client_tag: impl Into<String>) -> Self {
        Self::create(
            format!("/zone/{zone}/commandprocessor"),
            client_tag,
            json!({
                "Command": {
                    "CommandType": "GoToLevel",
                    "Parameter": [{"Type": "Level", "Value": level}]
                }
            }),
        )
    }

    /// Serialize as a single newline-terminated line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LeapResponse {
    #[serde(default)]
    pub communique_type: Option<String>,
    #[serde(default)]
    pub header: ResponseHeader,
    #[serde(default)]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseHeader {
    #[serde(default)]
    pub status_code: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub client_tag: Option<String>,
}

impl LeapResponse {
    /// Parse one line received from the bridge.
    ///
    /// # Errors
    ///
    /// Returns a bridge error if the line is not a LEAP message.
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line.trim()).map_err(|e| BridgeError::Bridge {
            reason: format!("Malformed message from bridge: {e}"),
        })
    }

    /// Whether the status code is a 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.header
            .status_code
            .as_deref()
            .is_some_and(|code| code.starts_with('2'))
    }

    /// Fail unless the response is a 2xx.
    ///
    /// # Errors
    ///
    /// Returns a bridge error carrying the status code and URL.
    pub fn ensure_success(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(BridgeError::Bridge {
            reason: format!(
                "{} returned {}",
                self.header.url.as_deref().unwrap_or("request"),
                self.header.status_code.as_deref().unwrap_or("no status")
            ),
        })
    }
}

/// Domain a bridge `DeviceType` belongs to, if it is a controllable or
/// sensing device at all.
#[must_use]
pub fn domain_for_type(device_type: &str) -> Option<DeviceDomain> {
    match device_type {
        "WallDimmer" | "PlugInDimmer" | "InLineDimmer" | "SunnataDimmer"
        | "TempInWallPaddleDimmer" | "WallDimmerWithPreset" | "Dimmed" | "SpectrumTune"
        | "DivaSmartDimmer" => Some(DeviceDomain::Light),
        "WallSwitch" | "OutdoorPlugInSwitch" | "PlugInSwitch" | "InLineSwitch"
        | "PowPakSwitch" | "SunnataSwitch" | "TempInWallPaddleSwitch" | "Switched" => {
            Some(DeviceDomain::Switch)
        }
        "CasetaFanSpeedController" | "MaestroFanSpeedController" | "FanSpeed" => {
            Some(DeviceDomain::Fan)
        }
        "SerenaHoneycombShade"
        | "SerenaRollerShade"
        | "TriathlonHoneycombShade"
        | "TriathlonRollerShade"
        | "QsWirelessShade"
        | "QsWirelessHorizontalSheerBlind"
        | "QsWirelessWoodBlind"
        | "RightDrawDrape"
        | "Shade"
        | "SerenaTiltOnlyWoodBlind" => Some(DeviceDomain::Cover),
        "FourGroupRemote" | "SeeTouchTabletopKeypad" | "SunnataKeypad" => {
            Some(DeviceDomain::Sensor)
        }
        t if t.starts_with("Pico") => Some(DeviceDomain::Sensor),
        _ => None,
    }
}

/// Last path segment of an href such as `/device/12`.
fn href_id(href: &str) -> Option<&str> {
    href.rsplit('/').next().filter(|id| !id.is_empty())
}

/// Every device in a `/device` response body, with its domain.
#[must_use]
pub fn parse_devices(body: &Value) -> Vec<(DeviceDomain, Device)> {
    let Some(entries) = body.get("Devices").and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let id = entry.get("href").and_then(Value::as_str).and_then(href_id)?;
            let device_type = entry.get("DeviceType").and_then(Value::as_str)?;
            let domain = domain_for_type(device_type)?;
            let name = device_name(entry);
            let zone = entry
                .get("LocalZones")
                .and_then(Value::as_array)
                .and_then(|zones| zones.first())
                .and_then(|zone| zone.get("href"))
                .and_then(Value::as_str)
                .and_then(href_id)
                .map(str::to_string);
            Some((domain, Device::new(id, name, device_type, zone)))
        })
        .collect()
}

fn device_name(entry: &Value) -> String {
    if let Some(parts) = entry.get("FullyQualifiedName").and_then(Value::as_array) {
        let joined: Vec<&str> = parts.iter().filter_map(Value::as_str).collect();
        if !joined.is_empty() {
            return joined.join(" ");
        }
    }
    entry
        .get("Name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Protocol version from a `/server/1` response body.
#[must_use]
pub fn protocol_version(body: &Value) -> Option<String> {
    body.pointer("/Server/ProtocolVersion")
        .and_then(Value::as_str)
        .map(str::to_string)
}
