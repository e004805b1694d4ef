#![no_main]

use libfuzzer_sys::fuzz_target;
use lutron_caseta_mcp::validate_host_ip;

fuzz_target!(|data: &str| {
    let result = validate_host_ip(data);

    // Accepted addresses are trimmed IP literals.
    if let Ok(address) = result {
        assert_eq!(address, data.trim());
        assert!(address.parse::<std::net::IpAddr>().is_ok());
    }
});
