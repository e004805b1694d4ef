use async_trait::async_trait;

use super::turn_on_device::{DEVICE_ID_SCHEMA, DeviceIdArgs};
use crate::domain::ConnectionManager;
use crate::error::Result;
use crate::mcp::device_tool::{DeviceCommand, DeviceTool};
use crate::security::validate_device_id;

pub struct TurnOffDeviceTool;

#[async_trait]
impl DeviceTool for TurnOffDeviceTool {
    type Args = DeviceIdArgs;
    const NAME: &'static str = "turn_off_device";
    const DESCRIPTION: &'static str = "Turn off a Lutron Caseta device by ID. Returns \
        {device_id, action, success}; success is false when the bridge did not accept the \
        command.";
    const SCHEMA: &'static str = DEVICE_ID_SCHEMA;
    const ACTION: &'static str = "turn_off";

    fn prepare(args: DeviceIdArgs) -> Result<DeviceCommand> {
        Ok(DeviceCommand::new(validate_device_id(&args.device_id)?))
    }

    async fn apply(manager: &ConnectionManager, command: &DeviceCommand) -> Result<bool> {
        manager.turn_off(&command.device_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::device_tool::DeviceToolHandler;
    use crate::ports::ToolHandler;
    use crate::ports::bridge::mock::ClientCall;
    use crate::ports::mock::create_connected_context;
    use serde_json::json;

    #[tokio::test]
    async fn test_turn_off_trims_id() {
        let (ctx, connector) = create_connected_context().await;
        let handler = DeviceToolHandler::<TurnOffDeviceTool>::new();

        let result = handler
            .execute(Some(json!({"device_id": " 12 "})), &ctx)
            .await
            .unwrap();

        let report = result.structured_content.unwrap();
        assert_eq!(report["device_id"], "12");
        assert_eq!(report["action"], "turn_off");
        assert_eq!(report["success"], true);
        assert_eq!(connector.client_calls(), vec![ClientCall::TurnOff("12".into())]);
    }

    #[tokio::test]
    async fn test_bridge_failure_is_not_a_tool_error() {
        let (ctx, connector) = create_connected_context().await;
        connector.fail_device("12");
        let handler = DeviceToolHandler::<TurnOffDeviceTool>::new();

        let result = handler
            .execute(Some(json!({"device_id": "12"})), &ctx)
            .await
            .unwrap();

        assert!(result.is_error.is_none());
        assert_eq!(result.structured_content.unwrap()["success"], false);
    }
}
