use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::ConnectionManager;
use crate::error::{BridgeError, Result};
use crate::mcp::device_tool::{DeviceCommand, DeviceTool};
use crate::security::{validate_device_id, validate_device_level};

#[derive(Debug, Deserialize)]
pub struct SetDeviceLevelArgs {
    pub device_id: String,
    /// Kept untyped so the validator can name the wrong type.
    pub level: Value,
}

pub struct SetDeviceLevelTool;

#[async_trait]
impl DeviceTool for SetDeviceLevelTool {
    type Args = SetDeviceLevelArgs;
    const NAME: &'static str = "set_device_level";
    const DESCRIPTION: &'static str = "Set the level of a Lutron Caseta dimmer, fan or shade \
        in percent (0 = off, 100 = full). Returns {device_id, action, level, success}.";
    const SCHEMA: &'static str = r#"{
        "type": "object",
        "properties": {
            "device_id": {
                "type": "string",
                "description": "Device ID from list_devices"
            },
            "level": {
                "type": "integer",
                "minimum": 0,
                "maximum": 100,
                "description": "Level in percent"
            }
        },
        "required": ["device_id", "level"]
    }"#;
    const ACTION: &'static str = "set_level";

    fn prepare(args: SetDeviceLevelArgs) -> Result<DeviceCommand> {
        let device_id = validate_device_id(&args.device_id)?;
        let level = validate_device_level(&args.level)?;
        Ok(DeviceCommand::new(device_id).with_level(level))
    }

    async fn apply(manager: &ConnectionManager, command: &DeviceCommand) -> Result<bool> {
        let level = command.level.ok_or_else(|| BridgeError::McpMissingParam {
            param: "level".to_string(),
        })?;
        manager.set_level(&command.device_id, i64::from(level)).await
    }
}
