#![no_main]

use libfuzzer_sys::fuzz_target;
use lutron_caseta_mcp::{JsonRpcRequest, ToolCallParams};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes from the MCP client must never panic the parser.
    if let Ok(json_str) = std::str::from_utf8(data) {
        if let Ok(request) = serde_json::from_str::<JsonRpcRequest>(json_str) {
            // Tool call params are parsed in a second step.
            if let Some(params) = request.params {
                let _: Result<ToolCallParams, _> = serde_json::from_value(params);
            }
        }
    }

    let _result: Result<JsonRpcRequest, _> = serde_json::from_slice(data);
});
