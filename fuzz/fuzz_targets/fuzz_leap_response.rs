#![no_main]

use libfuzzer_sys::fuzz_target;
use lutron_caseta_mcp::leap::protocol::{LeapResponse, parse_devices};

fuzz_target!(|data: &str| {
    // Lines from the bridge are untrusted.
    if let Ok(response) = LeapResponse::parse(data) {
        let _ = response.is_success();
        if let Some(body) = &response.body {
            for (_, device) in parse_devices(body) {
                assert!(!device.device_id.is_empty());
            }
        }
    }
});
