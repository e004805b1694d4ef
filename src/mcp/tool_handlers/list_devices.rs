use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};

use crate::domain::DeviceDomain;
use crate::error::Result;
use crate::mcp::device_tool::{connected_manager, parse_args};
use crate::mcp::protocol::ToolCallResult;
use crate::ports::{ToolContext, ToolHandler, ToolSchema};
use crate::security::validate_domain;

#[derive(Debug, Deserialize)]
struct ListDevicesArgs {
    /// A missing domain means `light`; an explicit null is left for the
    /// validator to reject as empty.
    #[serde(default = "default_domain", deserialize_with = "null_as_empty")]
    domain: String,
}

fn default_domain() -> String {
    DeviceDomain::default().as_str().to_string()
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Device listing tool handler
#[derive(Default)]
pub struct ListDevicesHandler;

impl ListDevicesHandler {
    const SCHEMA: &'static str = r#"{
        "type": "object",
        "properties": {
            "domain": {
                "type": "string",
                "enum": ["cover", "fan", "light", "sensor", "switch"],
                "default": "light",
                "description": "Device domain to list"
            }
        },
        "required": []
    }"#;
}

#[async_trait]
impl ToolHandler for ListDevicesHandler {
    fn name(&self) -> &'static str {
        "list_devices"
    }

    fn description(&self) -> &'static str {
        "List the devices paired with the Lutron Caseta bridge in one domain (light, switch, \
         cover, sensor or fan; defaults to light). Each device has a device_id, name, type \
         and zone. Use the device_id with the turn_on_device, turn_off_device and \
         set_device_level tools."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name(),
            description: self.description(),
            input_schema: Self::SCHEMA,
        }
    }

    async fn execute(&self, args: Option<Value>, ctx: &ToolContext) -> Result<ToolCallResult> {
        let args: ListDevicesArgs = parse_args(Some(args.unwrap_or_else(|| json!({}))))?;
        let domain = validate_domain(&args.domain)?;
        let manager = connected_manager(ctx).await?;

        let devices = manager.devices_by_domain(domain).await?;
        tracing::debug!(domain = %domain, count = devices.len(), "Listed devices");
        Ok(ToolCallResult::json(serde_json::to_value(devices)?))
    }
}
