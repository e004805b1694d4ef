#![no_main]

use libfuzzer_sys::fuzz_target;
use lutron_caseta_mcp::{validate_device_level, validate_domain};

fuzz_target!(|data: &[u8]| {
    // Levels arrive as arbitrary JSON values.
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) {
        if let Ok(level) = validate_device_level(&value) {
            assert!(level <= 100);
            assert!(value.is_u64());
        }
    }

    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(domain) = validate_domain(s) {
            assert_eq!(domain.as_str(), s.trim().to_lowercase());
        }
    }
});
