//! Tool handlers exposed over MCP

mod check_connection;
mod list_devices;
mod pair_bridge;
mod set_device_level;
mod turn_off_device;
mod turn_on_device;

pub use check_connection::CheckConnectionHandler;
pub use list_devices::ListDevicesHandler;
pub use pair_bridge::{BUTTON_PROMPT, PairBridgeHandler};
pub use set_device_level::SetDeviceLevelTool;
pub use turn_off_device::TurnOffDeviceTool;
pub use turn_on_device::TurnOnDeviceTool;
