use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::ConnectionManager;
use crate::error::Result;
use crate::mcp::device_tool::{DeviceCommand, DeviceTool};
use crate::security::validate_device_id;

#[derive(Debug, Deserialize)]
pub struct DeviceIdArgs {
    pub device_id: String,
}

pub const DEVICE_ID_SCHEMA: &str = r#"{
    "type": "object",
    "properties": {
        "device_id": {
            "type": "string",
            "description": "Device ID from list_devices"
        }
    },
    "required": ["device_id"]
}"#;

pub struct TurnOnDeviceTool;

#[async_trait]
impl DeviceTool for TurnOnDeviceTool {
    type Args = DeviceIdArgs;
    const NAME: &'static str = "turn_on_device";
    const DESCRIPTION: &'static str = "Turn on a Lutron Caseta device by ID. Dimmers go to \
        full brightness. Returns {device_id, action, success}; success is false when the \
        bridge did not accept the command.";
    const SCHEMA: &'static str = DEVICE_ID_SCHEMA;
    const ACTION: &'static str = "turn_on";

    fn prepare(args: DeviceIdArgs) -> Result<DeviceCommand> {
        Ok(DeviceCommand::new(validate_device_id(&args.device_id)?))
    }

    async fn apply(manager: &ConnectionManager, command: &DeviceCommand) -> Result<bool> {
        manager.turn_on(&command.device_id).await
    }
}
